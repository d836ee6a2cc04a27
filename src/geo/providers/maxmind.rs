//! MaxMind GeoIP2 City web service

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::net::IpAddr;

use crate::geo::models::GeoRecord;
use crate::geo::provider::{GeoLookup, ProviderError};

pub const DEFAULT_BASE_URL: &str = "https://geoip.maxmind.com";

pub struct MaxMindClient {
    client: Client,
    account_id: String,
    license_key: String,
    base_url: String,
}

impl MaxMindClient {
    pub const NAME: &'static str = "maxmind";

    pub fn new(client: Client, account_id: impl Into<String>, license_key: impl Into<String>) -> Self {
        Self {
            client,
            account_id: account_id.into(),
            license_key: license_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl GeoLookup for MaxMindClient {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn lookup(&self, address: IpAddr) -> Result<GeoRecord, ProviderError> {
        if self.account_id.is_empty() || self.license_key.is_empty() {
            return Err(ProviderError::NotConfigured);
        }

        let url = format!("{}/geoip/v2.1/city/{}", self.base_url, address);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.account_id, Some(&self.license_key))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(ProviderError::NotFound(address)),
            status if !status.is_success() => return Err(ProviderError::Status(status.as_u16())),
            _ => {}
        }

        let body = response.text().await?;
        parse_response(address, &body)
    }
}

#[derive(Debug, Deserialize)]
struct CityResponse {
    country: Option<Country>,
    #[serde(default)]
    subdivisions: Vec<Named>,
    city: Option<Named>,
    location: Option<Location>,
}

#[derive(Debug, Deserialize)]
struct Country {
    iso_code: Option<String>,
    #[serde(default)]
    names: Names,
}

#[derive(Debug, Deserialize)]
struct Named {
    #[serde(default)]
    names: Names,
}

#[derive(Debug, Default, Deserialize)]
struct Names {
    en: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Map a City response body to a record
pub(crate) fn parse_response(address: IpAddr, body: &str) -> Result<GeoRecord, ProviderError> {
    let data: CityResponse =
        serde_json::from_str(body).map_err(|err| ProviderError::Malformed(err.to_string()))?;

    let country = data
        .country
        .ok_or_else(|| ProviderError::Malformed("missing country".to_string()))?;
    let country_code = country
        .iso_code
        .ok_or_else(|| ProviderError::Malformed("missing country.iso_code".to_string()))?;

    let region = data
        .subdivisions
        .into_iter()
        .next()
        .and_then(|subdivision| subdivision.names.en)
        .unwrap_or_default();
    let (latitude, longitude) = data
        .location
        .map(|l| (l.latitude.unwrap_or(0.0), l.longitude.unwrap_or(0.0)))
        .unwrap_or((0.0, 0.0));

    Ok(GeoRecord {
        address,
        country_code,
        country_name: country.names.en.unwrap_or_default(),
        region,
        city: data.city.and_then(|city| city.names.en).unwrap_or_default(),
        latitude,
        longitude,
        source: MaxMindClient::NAME.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> IpAddr {
        "81.2.69.142".parse().unwrap()
    }

    #[test]
    fn test_parse_full_response() {
        let body = r#"{
            "city": {"geoname_id": 2643743, "names": {"en": "London", "de": "London"}},
            "country": {"iso_code": "GB", "names": {"en": "United Kingdom"}},
            "location": {"latitude": 51.5142, "longitude": -0.0931, "accuracy_radius": 10},
            "subdivisions": [{"iso_code": "ENG", "names": {"en": "England"}}]
        }"#;
        let record = parse_response(addr(), body).unwrap();
        assert_eq!(record.country_code, "GB");
        assert_eq!(record.country_name, "United Kingdom");
        assert_eq!(record.region, "England");
        assert_eq!(record.city, "London");
        assert_eq!(record.latitude, 51.5142);
        assert_eq!(record.source, "maxmind");
    }

    #[test]
    fn test_parse_country_only() {
        let body = r#"{"country": {"iso_code": "FR", "names": {"en": "France"}}}"#;
        let record = parse_response(addr(), body).unwrap();
        assert_eq!(record.country_code, "FR");
        assert!(record.region.is_empty());
        assert!(record.city.is_empty());
        assert_eq!(record.longitude, 0.0);
    }

    #[test]
    fn test_parse_missing_iso_code() {
        let body = r#"{"country": {"names": {"en": "Nowhere"}}}"#;
        assert!(matches!(parse_response(addr(), body), Err(ProviderError::Malformed(_))));
        assert!(matches!(parse_response(addr(), "not json"), Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let client = MaxMindClient::new(Client::new(), "", "");
        assert!(matches!(client.lookup(addr()).await, Err(ProviderError::NotConfigured)));
    }
}
