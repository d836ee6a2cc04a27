pub mod rules;

pub use rules::{LoadedRules, OverrideSection, PolicySection, RulesError, RulesFile};

use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::geo::providers::ipapi;
use crate::geo::ProviderKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub geo: GeoConfig,
    pub client_ip: ClientIpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    pub cache_ttl_secs: u64,
    /// TTL for `UNKNOWN` fallbacks
    pub unknown_ttl_secs: u64,
    pub cache_max_entries: u64,
    pub provider_timeout_secs: u64,
    /// Fallback order
    pub providers: Vec<ProviderKind>,
    #[serde(default)]
    pub maxmind: Option<MaxMindCredentials>,
    #[serde(default)]
    pub ip2location_api_key: Option<String>,
    pub lookup_private: bool,
    pub ipapi_rate_limit: u32,
    pub ipapi_rate_period_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxMindCredentials {
    pub account_id: String,
    pub license_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket address only
    #[default]
    None,
    /// Trust `CF-Connecting-IP`
    Cloudflare,
    /// Trust `Forwarded` / `X-Forwarded-For` / `X-Real-IP`
    Standard,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientIpConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    /// Proxy networks skipped when walking forwarding chains
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
    /// Fixed number of proxy hops to skip; takes precedence over
    /// `trusted_proxies`
    #[serde(default)]
    pub num_trusted_proxies: Option<usize>,
}

impl GeoConfig {
    const fn default_cache_ttl_secs() -> u64 {
        1800
    }

    const fn default_unknown_ttl_secs() -> u64 {
        300
    }

    const fn default_cache_max_entries() -> u64 {
        100_000
    }

    const fn default_provider_timeout_secs() -> u64 {
        5
    }

    const fn default_ipapi_rate_limit() -> u32 {
        ipapi::DEFAULT_RATE_LIMIT.limit
    }

    const fn default_ipapi_rate_period_secs() -> u64 {
        ipapi::DEFAULT_RATE_LIMIT.period.as_secs()
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: Self::default_cache_ttl_secs(),
            unknown_ttl_secs: Self::default_unknown_ttl_secs(),
            cache_max_entries: Self::default_cache_max_entries(),
            provider_timeout_secs: Self::default_provider_timeout_secs(),
            providers: ProviderKind::DEFAULT_ORDER.to_vec(),
            maxmind: None,
            ip2location_api_key: None,
            lookup_private: false,
            ipapi_rate_limit: Self::default_ipapi_rate_limit(),
            ipapi_rate_period_secs: Self::default_ipapi_rate_period_secs(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let providers = match non_empty_var("GEO_PROVIDERS") {
            Some(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(ProviderKind::from_str)
                .collect::<anyhow::Result<Vec<_>>>()
                .context("invalid GEO_PROVIDERS")?,
            None => ProviderKind::DEFAULT_ORDER.to_vec(),
        };

        let maxmind = match (
            non_empty_var("MAXMIND_ACCOUNT_ID"),
            non_empty_var("MAXMIND_LICENSE_KEY"),
        ) {
            (Some(account_id), Some(license_key)) => Some(MaxMindCredentials {
                account_id,
                license_key,
            }),
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "Only one of MAXMIND_ACCOUNT_ID and MAXMIND_LICENSE_KEY is set, MaxMind disabled"
                );
                None
            }
        };

        let geo = GeoConfig {
            cache_ttl_secs: parse_var("GEO_CACHE_TTL_SECS", GeoConfig::default_cache_ttl_secs())?,
            unknown_ttl_secs: parse_var(
                "GEO_UNKNOWN_TTL_SECS",
                GeoConfig::default_unknown_ttl_secs(),
            )?,
            cache_max_entries: parse_var(
                "GEO_CACHE_MAX_ENTRIES",
                GeoConfig::default_cache_max_entries(),
            )?,
            provider_timeout_secs: parse_var(
                "GEO_PROVIDER_TIMEOUT_SECS",
                GeoConfig::default_provider_timeout_secs(),
            )?,
            providers,
            maxmind,
            ip2location_api_key: non_empty_var("IP2LOCATION_API_KEY"),
            lookup_private: bool_var("GEO_LOOKUP_PRIVATE"),
            ipapi_rate_limit: parse_var(
                "IPAPI_RATE_LIMIT",
                GeoConfig::default_ipapi_rate_limit(),
            )?,
            ipapi_rate_period_secs: parse_var(
                "IPAPI_RATE_PERIOD_SECS",
                GeoConfig::default_ipapi_rate_period_secs(),
            )?,
        };

        let trusted_proxy_mode = match std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => TrustedProxyMode::None,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            "standard" => TrustedProxyMode::Standard,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, cloudflare, standard"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = match non_empty_var("TRUSTED_PROXIES") {
            Some(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.trim()
                        .parse::<IpNet>()
                        .with_context(|| format!("invalid TRUSTED_PROXIES entry '{}'", s.trim()))
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let num_trusted_proxies = non_empty_var("NUM_TRUSTED_PROXIES")
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES must be a non-negative integer")?;

        Ok(Config {
            geo,
            client_ip: ClientIpConfig {
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
            },
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bool_var(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_var(name) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("{name} has invalid value '{value}'")),
        None => Ok(default),
    }
}
