//! Address matching
//!
//! Validation, normalization and membership tests for single addresses,
//! CIDR blocks and hyphenated ranges, plus the allow/deny lists built from
//! them.

pub mod entry;
pub mod list;

pub use entry::{
    is_private_or_reserved, normalize, validate_address_entry, AddressEntry, AddressError,
    NetworkInfo, MAX_IPV4_RANGE_SIZE,
};
pub use list::{AddressList, AddressLists, ImportReport, ListKind, DEFAULT_MAX_ENTRIES};
