//! Address entry parsing and membership tests
//!
//! An entry is one of:
//! - a single address (`203.0.113.7`, `2001:db8::1`)
//! - a CIDR block (`192.168.1.0/24`, `2001:db8::/32`)
//! - a hyphenated range (`10.0.0.1-10.0.0.50`)
//!
//! Entries are validated once, when they enter a list or rule, and are
//! immutable afterwards. Membership is answered by numeric comparison,
//! never by enumerating a block.

use ipnet::IpNet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

/// Largest IPv4 range (in addresses) accepted by [`validate_address_entry`]
pub const MAX_IPV4_RANGE_SIZE: u64 = 65_536;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address entry is empty")]
    Empty,
    #[error("invalid IP address '{0}'")]
    InvalidAddress(String),
    #[error("invalid prefix length '{prefix}' for {family} network")]
    InvalidPrefix { prefix: String, family: &'static str },
    #[error("range endpoints {start} and {end} belong to different address families")]
    MixedFamilies { start: IpAddr, end: IpAddr },
    #[error("range start {start} is greater than range end {end}")]
    InvertedRange { start: IpAddr, end: IpAddr },
    #[error("IPv4 range {start}-{end} spans {size} addresses (limit is 65536)")]
    RangeTooLarge { start: IpAddr, end: IpAddr, size: u64 },
    #[error("entry '{0}' already exists in the list")]
    Duplicate(String),
    #[error("list is full ({0} entries)")]
    ListFull(usize),
    #[error("entry '{0}' is not in the list")]
    NotFound(String),
}

/// A validated single address, CIDR block, or bounded range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressEntry {
    Single(IpAddr),
    /// Stored with host bits cleared so equal blocks compare equal
    Cidr(IpNet),
    /// Inclusive on both ends, both ends of the same family
    Range { start: IpAddr, end: IpAddr },
}

/// First/last address covered by an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    pub first: IpAddr,
    pub last: IpAddr,
    pub prefix_len: Option<u8>,
    /// Number of covered addresses, saturating at `u128::MAX` for `::/0`
    pub size: u128,
}

/// Parse and validate an address entry.
///
/// Leading and trailing whitespace is ignored. IPv6 hex digits are accepted
/// in either case. Private and loopback addresses are valid entries.
pub fn validate_address_entry(text: &str) -> Result<AddressEntry, AddressError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AddressError::Empty);
    }

    if let Some((addr, prefix)) = text.split_once('/') {
        return parse_cidr(addr.trim(), prefix.trim());
    }

    if let Some((start, end)) = text.split_once('-') {
        return parse_range(start.trim(), end.trim());
    }

    parse_ip(text).map(AddressEntry::Single)
}

/// Canonical textual form of an entry.
///
/// Valid entries render as their normalized form (`192.168.1.7/24` becomes
/// `192.168.1.0/24`, IPv6 is compressed and lowercased). Text that does not
/// validate is returned trimmed and lowercased so it can still serve as a
/// lookup key.
pub fn normalize(text: &str) -> String {
    match validate_address_entry(text) {
        Ok(entry) => entry.to_string(),
        Err(_) => text.trim().to_ascii_lowercase(),
    }
}

fn parse_ip(text: &str) -> Result<IpAddr, AddressError> {
    text.parse::<IpAddr>()
        .map_err(|_| AddressError::InvalidAddress(text.to_string()))
}

fn parse_cidr(addr: &str, prefix: &str) -> Result<AddressEntry, AddressError> {
    let ip = parse_ip(addr)?;
    let family = family_name(ip);
    let invalid_prefix = || AddressError::InvalidPrefix {
        prefix: prefix.to_string(),
        family,
    };

    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_prefix());
    }
    let prefix_len = prefix.parse::<u8>().map_err(|_| invalid_prefix())?;

    let net = IpNet::new(ip, prefix_len).map_err(|_| invalid_prefix())?;
    Ok(AddressEntry::Cidr(net.trunc()))
}

fn parse_range(start: &str, end: &str) -> Result<AddressEntry, AddressError> {
    let start = parse_ip(start)?;
    let end = parse_ip(end)?;

    match (start, end) {
        (IpAddr::V4(s), IpAddr::V4(e)) => {
            let (s, e) = (u32::from(s), u32::from(e));
            if s > e {
                return Err(AddressError::InvertedRange { start, end });
            }
            let size = u64::from(e - s) + 1;
            if size > MAX_IPV4_RANGE_SIZE {
                return Err(AddressError::RangeTooLarge { start, end, size });
            }
        }
        (IpAddr::V6(s), IpAddr::V6(e)) => {
            if u128::from(s) > u128::from(e) {
                return Err(AddressError::InvertedRange { start, end });
            }
        }
        _ => return Err(AddressError::MixedFamilies { start, end }),
    }

    Ok(AddressEntry::Range { start, end })
}

fn family_name(ip: IpAddr) -> &'static str {
    match ip {
        IpAddr::V4(_) => "IPv4",
        IpAddr::V6(_) => "IPv6",
    }
}

impl AddressEntry {
    /// Whether `address` is covered by this entry.
    ///
    /// Addresses of the other family never match.
    pub fn contains(&self, address: IpAddr) -> bool {
        match *self {
            AddressEntry::Single(ip) => ip == address,
            AddressEntry::Cidr(net) => net.contains(&address),
            AddressEntry::Range { start, end } => match (start, end, address) {
                (IpAddr::V4(s), IpAddr::V4(e), IpAddr::V4(a)) => {
                    (u32::from(s)..=u32::from(e)).contains(&u32::from(a))
                }
                (IpAddr::V6(s), IpAddr::V6(e), IpAddr::V6(a)) => {
                    (u128::from(s)..=u128::from(e)).contains(&u128::from(a))
                }
                _ => false,
            },
        }
    }

    pub fn is_ipv6(&self) -> bool {
        match self {
            AddressEntry::Single(ip) => ip.is_ipv6(),
            AddressEntry::Cidr(net) => matches!(net, IpNet::V6(_)),
            AddressEntry::Range { start, .. } => start.is_ipv6(),
        }
    }

    /// Bounds of the covered block
    pub fn network_info(&self) -> NetworkInfo {
        match *self {
            AddressEntry::Single(ip) => NetworkInfo {
                first: ip,
                last: ip,
                prefix_len: None,
                size: 1,
            },
            AddressEntry::Cidr(net) => NetworkInfo {
                first: net.network(),
                last: net.broadcast(),
                prefix_len: Some(net.prefix_len()),
                size: span(net.network(), net.broadcast()),
            },
            AddressEntry::Range { start, end } => NetworkInfo {
                first: start,
                last: end,
                prefix_len: None,
                size: span(start, end),
            },
        }
    }
}

fn span(first: IpAddr, last: IpAddr) -> u128 {
    let diff = match (first, last) {
        (IpAddr::V4(f), IpAddr::V4(l)) => u128::from(u32::from(l) - u32::from(f)),
        (IpAddr::V6(f), IpAddr::V6(l)) => u128::from(l) - u128::from(f),
        _ => 0,
    };
    diff.saturating_add(1)
}

impl fmt::Display for AddressEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressEntry::Single(ip) => write!(f, "{ip}"),
            AddressEntry::Cidr(net) => write!(f, "{net}"),
            AddressEntry::Range { start, end } => write!(f, "{start}-{end}"),
        }
    }
}

impl FromStr for AddressEntry {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_address_entry(s)
    }
}

/// Private, loopback, link-local, documentation and other reserved space.
///
/// Exposed for callers that want to treat such addresses specially; the
/// matcher itself never excludes them.
pub fn is_private_or_reserved(address: IpAddr) -> bool {
    match address {
        IpAddr::V4(ip) => is_reserved_v4(ip),
        IpAddr::V6(ip) => {
            if let Some(mapped) = ip.to_ipv4_mapped() {
                return is_reserved_v4(mapped);
            }
            is_reserved_v6(ip)
        }
    }
}

fn is_reserved_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_unspecified()
        || a == 0
        // 100.64.0.0/10 shared address space
        || (a == 100 && (b & 0xc0) == 64)
        // 240.0.0.0/4 reserved
        || a >= 240
}

fn is_reserved_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
        || (first == 0x2001 && ip.segments()[1] == 0x0db8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_single_ipv4() {
        let entry = validate_address_entry("  203.0.113.7 ").unwrap();
        assert_eq!(entry, AddressEntry::Single(ip("203.0.113.7")));
        assert!(entry.contains(ip("203.0.113.7")));
        assert!(!entry.contains(ip("203.0.113.8")));
    }

    #[test]
    fn test_rejects_malformed_octets() {
        for bad in ["256.1.1.1", "1.2.3", "1.2.3.4.5", "a.b.c.d", "1..2.3"] {
            assert!(
                matches!(validate_address_entry(bad), Err(AddressError::InvalidAddress(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_entry() {
        assert_eq!(validate_address_entry("   "), Err(AddressError::Empty));
    }

    #[test]
    fn test_ipv6_case_insensitive() {
        let upper = validate_address_entry("2001:DB8::ABCD").unwrap();
        let lower = validate_address_entry("2001:db8::abcd").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "2001:db8::abcd");
    }

    #[test]
    fn test_cidr_membership() {
        let entry = validate_address_entry("192.168.1.0/24").unwrap();
        assert!(entry.contains(ip("192.168.1.1")));
        assert!(entry.contains(ip("192.168.1.254")));
        assert!(!entry.contains(ip("192.168.2.1")));
        assert!(!entry.contains(ip("::ffff:192.168.1.1")));
    }

    #[test]
    fn test_cidr_host_bits_are_masked() {
        let entry = validate_address_entry("192.168.1.77/24").unwrap();
        assert_eq!(entry.to_string(), "192.168.1.0/24");
        assert!(entry.contains(ip("192.168.1.200")));
    }

    #[test]
    fn test_cidr_prefix_bounds() {
        assert!(validate_address_entry("10.0.0.0/0").is_ok());
        assert!(validate_address_entry("10.0.0.0/32").is_ok());
        assert!(matches!(
            validate_address_entry("10.0.0.0/33"),
            Err(AddressError::InvalidPrefix { family: "IPv4", .. })
        ));
        assert!(validate_address_entry("2001:db8::/128").is_ok());
        assert!(matches!(
            validate_address_entry("2001:db8::/129"),
            Err(AddressError::InvalidPrefix { family: "IPv6", .. })
        ));
        assert!(validate_address_entry("10.0.0.0/-1").is_err());
        assert!(validate_address_entry("10.0.0.0/").is_err());
        assert!(validate_address_entry("10.0.0.0/24/8").is_err());
    }

    #[test]
    fn test_zero_prefix_matches_whole_family() {
        let entry = validate_address_entry("0.0.0.0/0").unwrap();
        assert!(entry.contains(ip("8.8.8.8")));
        assert!(!entry.contains(ip("2001:db8::1")));
    }

    #[test]
    fn test_ipv6_cidr_membership() {
        let entry = validate_address_entry("2001:db8:abcd::/48").unwrap();
        assert!(entry.contains(ip("2001:db8:abcd:12::1")));
        assert!(!entry.contains(ip("2001:db8:abce::1")));
    }

    #[test]
    fn test_range_membership() {
        let entry = validate_address_entry("10.0.0.10 - 10.0.0.20").unwrap();
        assert!(entry.contains(ip("10.0.0.10")));
        assert!(entry.contains(ip("10.0.0.15")));
        assert!(entry.contains(ip("10.0.0.20")));
        assert!(!entry.contains(ip("10.0.0.9")));
        assert!(!entry.contains(ip("10.0.0.21")));
    }

    #[test]
    fn test_range_crossing_octet_boundary() {
        let entry = validate_address_entry("10.0.0.250-10.0.1.5").unwrap();
        assert!(entry.contains(ip("10.0.1.0")));
        assert!(!entry.contains(ip("10.0.1.6")));
    }

    #[test]
    fn test_single_address_range_is_allowed() {
        let entry = validate_address_entry("10.0.0.1-10.0.0.1").unwrap();
        assert!(entry.contains(ip("10.0.0.1")));
    }

    #[test]
    fn test_range_validation_errors() {
        assert!(matches!(
            validate_address_entry("10.0.0.20-10.0.0.10"),
            Err(AddressError::InvertedRange { .. })
        ));
        assert!(matches!(
            validate_address_entry("10.0.0.1-2001:db8::1"),
            Err(AddressError::MixedFamilies { .. })
        ));
        assert!(matches!(
            validate_address_entry("10.0.0.0-10.1.0.0"),
            Err(AddressError::RangeTooLarge { .. })
        ));
    }

    #[test]
    fn test_range_size_limit_is_inclusive() {
        // exactly 65,536 addresses
        assert!(validate_address_entry("10.0.0.0-10.0.255.255").is_ok());
        // one more
        assert!(matches!(
            validate_address_entry("10.0.0.0-10.1.0.0"),
            Err(AddressError::RangeTooLarge { size: 65_537, .. })
        ));
    }

    #[test]
    fn test_ipv6_range_has_no_size_limit() {
        let entry = validate_address_entry("2001:db8::-2001:db8:ffff::").unwrap();
        assert!(entry.contains(ip("2001:db8:1234::1")));
        assert!(!entry.contains(ip("10.0.0.1")));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(" 192.168.1.9/24 "), "192.168.1.0/24");
        assert_eq!(normalize("2001:0DB8::0001"), "2001:db8::1");
        assert_eq!(normalize("10.0.0.1 - 10.0.0.9"), "10.0.0.1-10.0.0.9");
        assert_eq!(normalize(" NotAnIP "), "notanip");
    }

    #[test]
    fn test_network_info() {
        let info = validate_address_entry("192.168.1.0/24")
            .unwrap()
            .network_info();
        assert_eq!(info.first, ip("192.168.1.0"));
        assert_eq!(info.last, ip("192.168.1.255"));
        assert_eq!(info.prefix_len, Some(24));
        assert_eq!(info.size, 256);

        let info = validate_address_entry("::/0").unwrap().network_info();
        assert_eq!(info.size, u128::MAX);
    }

    #[test]
    fn test_private_and_reserved() {
        assert!(is_private_or_reserved(ip("10.1.2.3")));
        assert!(is_private_or_reserved(ip("127.0.0.1")));
        assert!(is_private_or_reserved(ip("100.64.0.1")));
        assert!(is_private_or_reserved(ip("fd00::1")));
        assert!(is_private_or_reserved(ip("::ffff:192.168.0.1")));
        assert!(!is_private_or_reserved(ip("8.8.8.8")));
        assert!(!is_private_or_reserved(ip("2606:4700::1111")));
    }

    #[test]
    fn test_private_addresses_are_valid_entries() {
        assert!(validate_address_entry("127.0.0.1").is_ok());
        assert!(validate_address_entry("10.0.0.0/8").is_ok());
    }
}
