//! Address to location resolution with graceful degradation
//!
//! Lookup order is cache, local dataset, then each remote provider in
//! configured order. Providers over their rate limit are skipped, failing
//! providers are logged and skipped. When nothing answers, the result is an
//! `UNKNOWN` record rather than an error, so callers always get a usable
//! location.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::models::GeoRecord;
use super::provider::{normalize_record, GeoLookup, ProviderError};
use super::providers::{build_http_client, configured_providers, IpApiClient};
use crate::address::is_private_or_reserved;
use crate::cache::TtlCache;
use crate::config::GeoConfig;
use crate::ratelimit::{RateLimit, RateLimiter};

/// Rate-limit action charged once per remote provider call; the provider's
/// name is the identifier.
pub const PROVIDER_LOOKUP_ACTION: &str = "geo_provider_lookup";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid IP address '{0}'")]
    InvalidAddress(String),
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// TTL of successfully resolved records
    pub cache_ttl: Duration,
    /// TTL of `UNKNOWN` fallbacks, so a provider outage is retried sooner
    pub unknown_ttl: Duration,
    pub cache_max_entries: u64,
    /// Bound on each single provider call
    pub provider_timeout: Duration,
    /// Send private and reserved addresses to providers too
    pub lookup_private: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(30 * 60),
            unknown_ttl: Duration::from_secs(5 * 60),
            cache_max_entries: 100_000,
            provider_timeout: Duration::from_secs(5),
            lookup_private: false,
        }
    }
}

impl From<&GeoConfig> for ResolverOptions {
    fn from(config: &GeoConfig) -> Self {
        Self {
            cache_ttl: Duration::from_secs(config.cache_ttl_secs),
            unknown_ttl: Duration::from_secs(config.unknown_ttl_secs),
            cache_max_entries: config.cache_max_entries,
            provider_timeout: Duration::from_secs(config.provider_timeout_secs),
            lookup_private: config.lookup_private,
        }
    }
}

#[derive(Clone)]
pub struct GeoResolver {
    cache: TtlCache<GeoRecord>,
    limiter: RateLimiter,
    dataset: Option<Arc<dyn GeoLookup>>,
    providers: Vec<Arc<dyn GeoLookup>>,
    options: ResolverOptions,
}

impl GeoResolver {
    /// A resolver with no dataset and no providers; every miss is `UNKNOWN`
    pub fn new(options: ResolverOptions, limiter: RateLimiter) -> Self {
        let cache = TtlCache::new(options.cache_max_entries, options.cache_ttl);
        Self {
            cache,
            limiter,
            dataset: None,
            providers: Vec::new(),
            options,
        }
    }

    /// Wire up HTTP providers, their rate limits and cache settings
    pub fn from_config(config: &GeoConfig) -> anyhow::Result<Self> {
        let options = ResolverOptions::from(config);
        let client = build_http_client(options.provider_timeout)?;

        let limiter = RateLimiter::new();
        limiter.set_limit_for(
            PROVIDER_LOOKUP_ACTION,
            IpApiClient::NAME,
            RateLimit::new(
                config.ipapi_rate_limit,
                Duration::from_secs(config.ipapi_rate_period_secs),
            ),
        );

        Ok(Self::new(options, limiter).with_providers(configured_providers(config, &client)))
    }

    /// Append a remote provider after those already configured
    pub fn with_provider(mut self, provider: Arc<dyn GeoLookup>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_providers(mut self, providers: Vec<Arc<dyn GeoLookup>>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Local dataset consulted before any provider, never rate limited
    pub fn with_dataset(mut self, dataset: Arc<dyn GeoLookup>) -> Self {
        self.dataset = Some(dataset);
        self
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// Resolve textual input. Only an unparseable address is an error.
    pub async fn resolve(&self, address: &str) -> Result<GeoRecord, ResolveError> {
        let ip = address
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| ResolveError::InvalidAddress(address.to_string()))?;
        Ok(self.resolve_ip(ip).await)
    }

    pub async fn resolve_ip(&self, address: IpAddr) -> GeoRecord {
        self.resolve_inner(address, None).await
    }

    /// Resolve, abandoning any in-flight lookup at `deadline`.
    ///
    /// An abandoned resolution yields `UNKNOWN` and is not cached.
    pub async fn resolve_with_deadline(&self, address: IpAddr, deadline: Instant) -> GeoRecord {
        self.resolve_inner(address, Some(deadline)).await
    }

    /// Forget the cached record for `address`
    pub async fn invalidate(&self, address: IpAddr) {
        self.cache.delete(&cache_key(address)).await;
    }

    pub async fn flush(&self) {
        self.cache.flush().await;
    }

    pub async fn cached_entries(&self) -> u64 {
        self.cache.len().await
    }

    async fn resolve_inner(&self, address: IpAddr, deadline: Option<Instant>) -> GeoRecord {
        if !self.options.lookup_private && is_private_or_reserved(address) {
            debug!(%address, "Private or reserved address, skipping lookup");
            return GeoRecord::unknown(address);
        }

        let key = cache_key(address);
        if let Some(record) = self.cache.get(&key).await {
            debug!(%address, country = %record.country_code, "Geolocation cache hit");
            return record;
        }
        debug!(%address, "Geolocation cache miss");

        let found = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, self.lookup_uncached(address)).await {
                    Ok(found) => found,
                    Err(_) => {
                        warn!(%address, "Geolocation deadline exceeded, using UNKNOWN");
                        return GeoRecord::unknown(address);
                    }
                }
            }
            None => self.lookup_uncached(address).await,
        };

        match found {
            Some(record) => {
                self.cache
                    .set(key, record.clone(), self.options.cache_ttl)
                    .await;
                record
            }
            None => {
                warn!(%address, "All geolocation sources exhausted, using UNKNOWN");
                let record = GeoRecord::unknown(address);
                self.cache
                    .set(key, record.clone(), self.options.unknown_ttl)
                    .await;
                record
            }
        }
    }

    async fn lookup_uncached(&self, address: IpAddr) -> Option<GeoRecord> {
        if let Some(dataset) = &self.dataset {
            match self.query(dataset.as_ref(), address).await {
                Ok(record) => return Some(record),
                Err(ProviderError::NotFound(_)) => {
                    debug!(%address, dataset = dataset.name(), "Address not in local dataset")
                }
                Err(err) => {
                    warn!(%address, dataset = dataset.name(), error = %err, "Local dataset lookup failed")
                }
            }
        }

        for provider in &self.providers {
            let name = provider.name();
            if !self.limiter.allow(PROVIDER_LOOKUP_ACTION, name) {
                warn!(provider = name, "Geolocation provider rate limited, skipping");
                continue;
            }

            match self.query(provider.as_ref(), address).await {
                Ok(record) => {
                    debug!(%address, provider = name, country = %record.country_code, "Resolved location");
                    return Some(record);
                }
                Err(err) => {
                    warn!(%address, provider = name, error = %err, "Geolocation provider failed");
                }
            }
        }

        None
    }

    async fn query(
        &self,
        source: &dyn GeoLookup,
        address: IpAddr,
    ) -> Result<GeoRecord, ProviderError> {
        let timeout = self.options.provider_timeout;
        let record = tokio::time::timeout(timeout, source.lookup(address))
            .await
            .map_err(|_| ProviderError::Timeout(timeout))??;
        normalize_record(record, address, source.name())
    }
}

fn cache_key(address: IpAddr) -> String {
    format!("geo:{address}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        country: &'static str,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, country: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                country,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl GeoLookup for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn lookup(&self, address: IpAddr) -> Result<GeoRecord, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GeoRecord {
                country_code: self.country.to_string(),
                ..GeoRecord::unknown(address)
            })
        }
    }

    #[tokio::test]
    async fn test_private_address_short_circuits() {
        let provider = Fixed::new("fixed", "US");
        let resolver = GeoResolver::new(ResolverOptions::default(), RateLimiter::new())
            .with_provider(provider.clone());

        let record = resolver.resolve_ip("192.168.1.10".parse().unwrap()).await;
        assert!(record.is_unknown());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_private_when_enabled() {
        let provider = Fixed::new("fixed", "us");
        let options = ResolverOptions {
            lookup_private: true,
            ..Default::default()
        };
        let resolver = GeoResolver::new(options, RateLimiter::new()).with_provider(provider.clone());

        let record = resolver.resolve_ip("10.1.2.3".parse().unwrap()).await;
        assert_eq!(record.country_code, "US");
        assert_eq!(record.source, "fixed");
    }

    #[tokio::test]
    async fn test_invalid_input_is_the_only_error() {
        let resolver = GeoResolver::new(ResolverOptions::default(), RateLimiter::new());
        assert_eq!(
            resolver.resolve("not-an-ip").await,
            Err(ResolveError::InvalidAddress("not-an-ip".to_string()))
        );
        let record = resolver.resolve(" 1.2.3.4 ").await.unwrap();
        assert!(record.is_unknown());
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_lookup() {
        let provider = Fixed::new("fixed", "FR");
        let resolver = GeoResolver::new(ResolverOptions::default(), RateLimiter::new())
            .with_provider(provider.clone());
        let address: IpAddr = "2.2.2.2".parse().unwrap();

        resolver.resolve_ip(address).await;
        resolver.resolve_ip(address).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        resolver.invalidate(address).await;
        resolver.resolve_ip(address).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        resolver.flush().await;
        resolver.resolve_ip(address).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_options_from_config() {
        let options = ResolverOptions::from(&GeoConfig::default());
        assert_eq!(options.cache_ttl, Duration::from_secs(1800));
        assert_eq!(options.unknown_ttl, Duration::from_secs(300));
        assert_eq!(options.provider_timeout, Duration::from_secs(5));
        assert!(!options.lookup_private);
    }
}
