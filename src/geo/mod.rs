//! Geolocation
//!
//! Turns client addresses into location records using a local dataset and a
//! fallback chain of web services, with caching and per-provider rate limits.

pub mod client_ip;
pub mod dataset;
pub mod models;
pub mod provider;
pub mod providers;
pub mod resolver;

pub use client_ip::extract_client_ip;
pub use dataset::{DatasetError, DatasetRow, StaticDataset};
pub use models::GeoRecord;
pub use provider::{normalize_record, GeoLookup, ProviderError};
pub use providers::ProviderKind;
pub use resolver::{GeoResolver, ResolveError, ResolverOptions, PROVIDER_LOOKUP_ACTION};
