//! Access decision engine
//!
//! Combines the address lists, the country policy and the override rules
//! into one verdict. Evaluation order is fixed:
//!
//! 1. exempt requester: allow
//! 2. address on the allow list: allow (beats everything below)
//! 3. address on the deny list: deny
//! 4. country policy, with `UNKNOWN` treated like any other code
//! 5. override rules by ascending priority: a matching `allow` returns
//!    immediately, a matching `deny` only marks the request as blocked, so
//!    a later `allow` still wins
//!
//! Everything here is a pure function of its arguments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use super::country::{CountryPolicy, PolicyMode};
use super::exemption::Exemption;
use super::overrides::{OverrideRule, RuleEffect};
use crate::address::AddressLists;

pub const REASON_EXEMPT: &str = "exempt";
pub const REASON_ALLOW_LISTED: &str = "address allow-listed";
pub const REASON_DENY_LISTED: &str = "address deny-listed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub blocked: bool,
    pub reason: String,
}

impl Verdict {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            blocked: false,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.blocked { "DENY" } else { "ALLOW" };
        write!(f, "{outcome}: {}", self.reason)
    }
}

/// The steps that need no location data.
///
/// Returns `Some` when exemption or list membership already decides the
/// request, so callers can skip geolocation entirely.
pub fn precheck(address: IpAddr, lists: &AddressLists, exemption: &Exemption) -> Option<Verdict> {
    if exemption.is_exempt() {
        return Some(Verdict::allow(REASON_EXEMPT));
    }
    if lists.allow.matches(address) {
        return Some(Verdict::allow(REASON_ALLOW_LISTED));
    }
    if lists.deny.matches(address) {
        return Some(Verdict::deny(REASON_DENY_LISTED));
    }
    None
}

/// Decide access for `address` resolved to `country`.
///
/// `country` is the resolver's code, `UNKNOWN` included.
pub fn decide(
    address: IpAddr,
    country: &str,
    overrides: &[OverrideRule],
    lists: &AddressLists,
    policy: &CountryPolicy,
    exemption: &Exemption,
) -> Verdict {
    if let Some(verdict) = precheck(address, lists, exemption) {
        return verdict;
    }

    let policy_verdict = apply_policy(policy, country);

    let mut ordered: Vec<&OverrideRule> = overrides.iter().collect();
    // stable: equal priorities keep configuration order
    ordered.sort_by_key(|rule| rule.priority);

    let mut first_deny: Option<&OverrideRule> = None;
    for rule in ordered {
        if !rule.matches(address, country) {
            continue;
        }
        match rule.effect {
            RuleEffect::Allow => {
                return Verdict::allow(format!("override allow ({})", rule.target));
            }
            RuleEffect::Deny => {
                first_deny.get_or_insert(rule);
            }
        }
    }

    match first_deny {
        Some(rule) => Verdict::deny(format!("override deny ({})", rule.target)),
        None => policy_verdict,
    }
}

fn apply_policy(policy: &CountryPolicy, country: &str) -> Verdict {
    let listed = policy.lists(country);
    match policy.mode {
        PolicyMode::AllowOnly if listed => Verdict::allow(format!("country allowed ({country})")),
        PolicyMode::AllowOnly => Verdict::deny(format!("country not in allow-list ({country})")),
        PolicyMode::DenyListed if listed => Verdict::deny(format!("country blocked ({country})")),
        PolicyMode::DenyListed => Verdict::allow(format!("country not blocked ({country})")),
    }
}
