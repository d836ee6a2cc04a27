//! Remote geolocation web services

pub mod ip2location;
pub mod ipapi;
pub mod maxmind;

pub use ip2location::Ip2LocationClient;
pub use ipapi::IpApiClient;
pub use maxmind::MaxMindClient;

use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::provider::GeoLookup;
use crate::config::GeoConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    MaxMind,
    Ip2Location,
    #[serde(alias = "ip-api")]
    IpApi,
}

impl ProviderKind {
    /// Default fallback order: paid services first
    pub const DEFAULT_ORDER: [ProviderKind; 3] =
        [ProviderKind::MaxMind, ProviderKind::Ip2Location, ProviderKind::IpApi];

    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::MaxMind => MaxMindClient::NAME,
            ProviderKind::Ip2Location => Ip2LocationClient::NAME,
            ProviderKind::IpApi => IpApiClient::NAME,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "maxmind" => Ok(ProviderKind::MaxMind),
            "ip2location" => Ok(ProviderKind::Ip2Location),
            "ipapi" | "ip-api" => Ok(ProviderKind::IpApi),
            other => anyhow::bail!(
                "unknown geolocation provider '{other}'. Supported values: maxmind, ip2location, ipapi"
            ),
        }
    }
}

pub fn build_http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(concat!("geogate/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client for geolocation providers")
}

/// Instantiate the configured providers in order.
///
/// Providers whose credentials are missing are left out with a warning.
pub fn configured_providers(
    config: &GeoConfig,
    client: &Client,
) -> Vec<Arc<dyn GeoLookup>> {
    let mut providers: Vec<Arc<dyn GeoLookup>> = Vec::new();

    for kind in &config.providers {
        match kind {
            ProviderKind::MaxMind => match &config.maxmind {
                Some(credentials) => providers.push(Arc::new(MaxMindClient::new(
                    client.clone(),
                    credentials.account_id.clone(),
                    credentials.license_key.clone(),
                ))),
                None => warn!(
                    "MaxMind provider listed but MAXMIND_ACCOUNT_ID/MAXMIND_LICENSE_KEY not set, skipping"
                ),
            },
            ProviderKind::Ip2Location => match &config.ip2location_api_key {
                Some(key) => {
                    providers.push(Arc::new(Ip2LocationClient::new(client.clone(), key.clone())))
                }
                None => warn!("IP2Location provider listed but IP2LOCATION_API_KEY not set, skipping"),
            },
            ProviderKind::IpApi => providers.push(Arc::new(IpApiClient::new(client.clone()))),
        }
    }

    info!(
        providers = ?providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
        "Geolocation providers configured"
    );
    providers
}
