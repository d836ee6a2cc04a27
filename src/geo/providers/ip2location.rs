//! IP2Location web service

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::net::IpAddr;

use crate::geo::models::GeoRecord;
use crate::geo::provider::{GeoLookup, ProviderError};

pub const DEFAULT_ENDPOINT: &str = "https://api.ip2location.com/v2/";

/// Package WS10 carries country, region, city and coordinates
const PACKAGE: &str = "WS10";

pub struct Ip2LocationClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl Ip2LocationClient {
    pub const NAME: &'static str = "ip2location";

    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl GeoLookup for Ip2LocationClient {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn lookup(&self, address: IpAddr) -> Result<GeoRecord, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured);
        }

        let ip = address.to_string();
        let url = Url::parse_with_params(
            &self.endpoint,
            &[
                ("key", self.api_key.as_str()),
                ("ip", ip.as_str()),
                ("package", PACKAGE),
                ("format", "json"),
            ],
        )
        .map_err(|err| ProviderError::InvalidEndpoint(err.to_string()))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_response(address, &body)
    }
}

#[derive(Debug, Deserialize)]
struct Ip2LocationResponse {
    country_code: Option<String>,
    country_name: Option<String>,
    region_name: Option<String>,
    city_name: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    /// Set instead of the location fields when the key is rejected
    response: Option<String>,
}

pub(crate) fn parse_response(address: IpAddr, body: &str) -> Result<GeoRecord, ProviderError> {
    let data: Ip2LocationResponse =
        serde_json::from_str(body).map_err(|err| ProviderError::Malformed(err.to_string()))?;

    let Some(country_code) = data.country_code else {
        let message = data
            .response
            .unwrap_or_else(|| "missing country_code".to_string());
        return Err(ProviderError::Malformed(message));
    };

    // "-" marks reserved or unallocated space
    if country_code == "-" {
        return Err(ProviderError::NotFound(address));
    }

    Ok(GeoRecord {
        address,
        country_code,
        country_name: data.country_name.unwrap_or_default(),
        region: data.region_name.unwrap_or_default(),
        city: data.city_name.unwrap_or_default(),
        latitude: data.latitude.unwrap_or(0.0),
        longitude: data.longitude.unwrap_or(0.0),
        source: Ip2LocationClient::NAME.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> IpAddr {
        "8.8.8.8".parse().unwrap()
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "country_code": "US",
            "country_name": "United States of America",
            "region_name": "California",
            "city_name": "Mountain View",
            "latitude": 37.40599,
            "longitude": -122.078514,
            "zip_code": "94043",
            "credits_consumed": 7
        }"#;
        let record = parse_response(addr(), body).unwrap();
        assert_eq!(record.country_code, "US");
        assert_eq!(record.region, "California");
        assert_eq!(record.city, "Mountain View");
        assert_eq!(record.source, "ip2location");
    }

    #[test]
    fn test_parse_error_message() {
        let body = r#"{"response": "INVALID ACCOUNT"}"#;
        match parse_response(addr(), body) {
            Err(ProviderError::Malformed(message)) => assert_eq!(message, "INVALID ACCOUNT"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_reserved_address() {
        let body = r#"{"country_code": "-", "country_name": "-"}"#;
        assert!(matches!(parse_response(addr(), body), Err(ProviderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let client = Ip2LocationClient::new(Client::new(), "");
        assert!(matches!(client.lookup(addr()).await, Err(ProviderError::NotConfigured)));
    }
}
