pub mod country;
pub mod engine;
pub mod exemption;
pub mod overrides;
pub mod regions;

pub use country::{CountryCode, CountryCodeError, CountryPolicy, PolicyMode, UNKNOWN_COUNTRY};
pub use engine::{decide, precheck, Verdict};
pub use exemption::{Exemption, ExemptionPolicy, RequesterContext};
pub use overrides::{OverrideRule, OverrideRuleError, RuleEffect, RuleKind, RuleTarget};

use crate::address::AddressLists;

/// Everything the engine needs besides the requester, loaded together
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    pub lists: AddressLists,
    pub policy: CountryPolicy,
    pub overrides: Vec<OverrideRule>,
}

impl RuleSnapshot {
    pub fn decide(&self, address: std::net::IpAddr, country: &str, exemption: &Exemption) -> Verdict {
        decide(
            address,
            country,
            &self.overrides,
            &self.lists,
            &self.policy,
            exemption,
        )
    }

    pub fn precheck(&self, address: std::net::IpAddr, exemption: &Exemption) -> Option<Verdict> {
        precheck(address, &self.lists, exemption)
    }
}
