//! Access gate: one call from client address to verdict
//!
//! Runs the checks that need no I/O first, resolves the location only when
//! the verdict still depends on it, then applies the full rule order.

use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::geo::{GeoRecord, GeoResolver, ResolveError};
use crate::rules::{Exemption, RuleSnapshot, Verdict};

/// Outcome of a gate check
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub address: IpAddr,
    pub verdict: Verdict,
    /// Absent when the verdict did not need a location
    pub location: Option<GeoRecord>,
}

impl Decision {
    pub fn is_blocked(&self) -> bool {
        self.verdict.blocked
    }
}

#[derive(Clone)]
pub struct AccessGate {
    resolver: GeoResolver,
    resolve_budget: Option<Duration>,
}

impl AccessGate {
    pub fn new(resolver: GeoResolver) -> Self {
        Self {
            resolver,
            resolve_budget: None,
        }
    }

    /// Bound the time spent resolving per check; an overrun counts as an
    /// unknown country
    pub fn with_resolve_budget(mut self, budget: Duration) -> Self {
        self.resolve_budget = Some(budget);
        self
    }

    pub fn resolver(&self) -> &GeoResolver {
        &self.resolver
    }

    /// Decide for `address`. IPv4-mapped IPv6 input is checked as the
    /// IPv4 address it carries.
    pub async fn check(
        &self,
        address: IpAddr,
        exemption: &Exemption,
        rules: &RuleSnapshot,
    ) -> Decision {
        let address = address.to_canonical();
        if let Some(verdict) = rules.precheck(address, exemption) {
            debug!(%address, reason = %verdict.reason, "Decided without geolocation");
            return self.finish(address, verdict, None);
        }

        let location = match self.resolve_budget {
            Some(budget) => {
                let deadline = tokio::time::Instant::now() + budget;
                self.resolver.resolve_with_deadline(address, deadline).await
            }
            None => self.resolver.resolve_ip(address).await,
        };

        let verdict = rules.decide(address, &location.country_code, exemption);
        self.finish(address, verdict, Some(location))
    }

    /// Same as [`check`](Self::check) for textual input
    pub async fn check_str(
        &self,
        address: &str,
        exemption: &Exemption,
        rules: &RuleSnapshot,
    ) -> Result<Decision, ResolveError> {
        let ip = address
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| ResolveError::InvalidAddress(address.to_string()))?;
        Ok(self.check(ip, exemption, rules).await)
    }

    fn finish(&self, address: IpAddr, verdict: Verdict, location: Option<GeoRecord>) -> Decision {
        if verdict.blocked {
            warn!(
                %address,
                reason = %verdict.reason,
                country = location.as_ref().map(|l| l.country_code.as_str()).unwrap_or("-"),
                "Access blocked"
            );
        }
        Decision {
            address,
            verdict,
            location,
        }
    }
}
