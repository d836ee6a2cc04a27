//! ip-api.com free JSON endpoint
//!
//! Needs no credentials but allows only 45 requests per minute per client
//! address, so it is normally paired with a rate limit.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::net::IpAddr;

use crate::geo::models::GeoRecord;
use crate::geo::provider::{GeoLookup, ProviderError};
use crate::ratelimit::RateLimit;

pub const DEFAULT_BASE_URL: &str = "http://ip-api.com";

const FIELDS: &str = "status,message,country,countryCode,regionName,city,lat,lon";

/// The service's published free-tier quota
pub const DEFAULT_RATE_LIMIT: RateLimit = RateLimit::per_minute(45);

pub struct IpApiClient {
    client: Client,
    base_url: String,
}

impl IpApiClient {
    pub const NAME: &'static str = "ipapi";

    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl GeoLookup for IpApiClient {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn lookup(&self, address: IpAddr) -> Result<GeoRecord, ProviderError> {
        let url = format!("{}/json/{}?fields={}", self.base_url, address, FIELDS);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_response(address, &body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
    region_name: Option<String>,
    city: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

pub(crate) fn parse_response(address: IpAddr, body: &str) -> Result<GeoRecord, ProviderError> {
    let data: IpApiResponse =
        serde_json::from_str(body).map_err(|err| ProviderError::Malformed(err.to_string()))?;

    if data.status != "success" {
        let message = data.message.unwrap_or_else(|| data.status.clone());
        return match message.as_str() {
            "private range" | "reserved range" => Err(ProviderError::NotFound(address)),
            _ => Err(ProviderError::Malformed(message)),
        };
    }

    let country_code = data
        .country_code
        .ok_or_else(|| ProviderError::Malformed("missing countryCode".to_string()))?;

    Ok(GeoRecord {
        address,
        country_code,
        country_name: data.country.unwrap_or_default(),
        region: data.region_name.unwrap_or_default(),
        city: data.city.unwrap_or_default(),
        latitude: data.lat.unwrap_or(0.0),
        longitude: data.lon.unwrap_or(0.0),
        source: IpApiClient::NAME.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn addr() -> IpAddr {
        "24.48.0.1".parse().unwrap()
    }

    #[test]
    fn test_parse_success() {
        let body = r#"{
            "status": "success",
            "country": "Canada",
            "countryCode": "CA",
            "regionName": "Quebec",
            "city": "Montreal",
            "lat": 45.6085,
            "lon": -73.5493
        }"#;
        let record = parse_response(addr(), body).unwrap();
        assert_eq!(record.country_code, "CA");
        assert_eq!(record.country_name, "Canada");
        assert_eq!(record.region, "Quebec");
        assert_eq!((record.latitude, record.longitude), (45.6085, -73.5493));
    }

    #[test]
    fn test_parse_fail_status() {
        let body = r#"{"status": "fail", "message": "invalid query"}"#;
        match parse_response(addr(), body) {
            Err(ProviderError::Malformed(message)) => assert_eq!(message, "invalid query"),
            other => panic!("unexpected: {other:?}"),
        }

        let body = r#"{"status": "fail", "message": "private range"}"#;
        assert!(matches!(parse_response(addr(), body), Err(ProviderError::NotFound(_))));
    }

    #[test]
    fn test_default_rate_limit() {
        assert_eq!(DEFAULT_RATE_LIMIT.limit, 45);
        assert_eq!(DEFAULT_RATE_LIMIT.period, Duration::from_secs(60));
    }
}
