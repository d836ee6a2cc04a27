use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

use super::models::GeoRecord;
use crate::rules::CountryCode;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider is missing credentials")]
    NotConfigured,
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no location data for {0}")]
    NotFound(IpAddr),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// A source of location data: remote web service or local dataset
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Short, stable name used in logs and as the rate-limit identifier
    fn name(&self) -> &str;

    async fn lookup(&self, address: IpAddr) -> Result<GeoRecord, ProviderError>;
}

/// Check a provider's answer before it is trusted or cached.
///
/// The country code must be a valid alpha-2 code; it is uppercased and the
/// record is stamped with the queried address and the provider's name.
pub fn normalize_record(
    mut record: GeoRecord,
    address: IpAddr,
    source: &str,
) -> Result<GeoRecord, ProviderError> {
    let code = CountryCode::parse(&record.country_code)
        .map_err(|err| ProviderError::Malformed(err.to_string()))?;

    if !record.latitude.is_finite() || !record.longitude.is_finite() {
        return Err(ProviderError::Malformed("non-finite coordinates".to_string()));
    }

    record.country_code = code.to_string();
    record.address = address;
    record.source = source.to_string();
    Ok(record)
}
