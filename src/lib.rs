//! Geo/IP access decisions
//!
//! Decides whether a client address may access a resource, based on address
//! allow/deny lists, a country policy, priority-ordered override rules and
//! requester exemptions. Locations come from a cached, rate-limited fallback
//! chain of geolocation sources that degrades to an `UNKNOWN` country instead
//! of failing.

pub mod address;
pub mod cache;
pub mod config;
pub mod gate;
pub mod geo;
pub mod ratelimit;
pub mod rules;

pub use address::{validate_address_entry, AddressEntry, AddressError, AddressList, AddressLists};
pub use gate::{AccessGate, Decision};
pub use geo::{GeoRecord, GeoResolver};
pub use ratelimit::RateLimiter;
pub use rules::{decide, RuleSnapshot, Verdict};
