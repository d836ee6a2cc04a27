use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

use super::country::{CountryCode, CountryCodeError};
use crate::address::{validate_address_entry, AddressEntry, AddressError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    #[serde(alias = "ip")]
    Address,
    Country,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleEffect {
    Allow,
    #[serde(alias = "block")]
    Deny,
}

/// What an override rule matches against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    Address(AddressEntry),
    Country(CountryCode),
}

#[derive(Debug, Error)]
pub enum OverrideRuleError {
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Country(#[from] CountryCodeError),
}

/// Priority-ordered exception to the address and country rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRule {
    pub target: RuleTarget,
    pub effect: RuleEffect,
    /// Lower values are evaluated first
    pub priority: i32,
}

impl OverrideRule {
    pub fn new(target: RuleTarget, effect: RuleEffect, priority: i32) -> Self {
        Self {
            target,
            effect,
            priority,
        }
    }

    /// Validate raw rule data
    pub fn parse(
        kind: RuleKind,
        value: &str,
        effect: RuleEffect,
        priority: i32,
    ) -> Result<Self, OverrideRuleError> {
        let target = match kind {
            RuleKind::Address => RuleTarget::Address(validate_address_entry(value)?),
            RuleKind::Country => RuleTarget::Country(CountryCode::parse(value)?),
        };
        Ok(Self::new(target, effect, priority))
    }

    pub fn kind(&self) -> RuleKind {
        match self.target {
            RuleTarget::Address(_) => RuleKind::Address,
            RuleTarget::Country(_) => RuleKind::Country,
        }
    }

    pub fn matches(&self, address: IpAddr, country: &str) -> bool {
        match &self.target {
            RuleTarget::Address(entry) => entry.contains(address),
            RuleTarget::Country(code) => code.as_str().eq_ignore_ascii_case(country),
        }
    }
}

impl fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTarget::Address(entry) => write!(f, "address {entry}"),
            RuleTarget::Country(code) => write!(f, "country {code}"),
        }
    }
}

impl fmt::Display for RuleEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleEffect::Allow => f.write_str("allow"),
            RuleEffect::Deny => f.write_str("deny"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_rule() {
        let rule = OverrideRule::parse(RuleKind::Address, "10.0.0.0/8", RuleEffect::Deny, 5).unwrap();
        assert_eq!(rule.kind(), RuleKind::Address);
        assert!(rule.matches("10.9.9.9".parse().unwrap(), "US"));
        assert!(!rule.matches("11.0.0.1".parse().unwrap(), "US"));
    }

    #[test]
    fn test_parse_country_rule() {
        let rule = OverrideRule::parse(RuleKind::Country, "fr", RuleEffect::Allow, 1).unwrap();
        assert!(rule.matches("1.2.3.4".parse().unwrap(), "FR"));
        assert!(rule.matches("1.2.3.4".parse().unwrap(), "fr"));
        assert!(!rule.matches("1.2.3.4".parse().unwrap(), "DE"));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(matches!(
            OverrideRule::parse(RuleKind::Address, "300.1.1.1", RuleEffect::Deny, 0),
            Err(OverrideRuleError::Address(_))
        ));
        assert!(matches!(
            OverrideRule::parse(RuleKind::Country, "France", RuleEffect::Deny, 0),
            Err(OverrideRuleError::Country(_))
        ));
    }

    #[test]
    fn test_target_display() {
        let rule = OverrideRule::parse(RuleKind::Country, "us", RuleEffect::Deny, 0).unwrap();
        assert_eq!(rule.target.to_string(), "country US");
    }
}
