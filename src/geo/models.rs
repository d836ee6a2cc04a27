//! Data models for geolocation

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::rules::UNKNOWN_COUNTRY;

/// Location information derived from an IP address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    pub address: IpAddr,

    /// ISO 3166-1 alpha-2 code, or `UNKNOWN`
    pub country_code: String,

    pub country_name: String,

    /// Region/state/province
    pub region: String,

    pub city: String,

    pub latitude: f64,

    pub longitude: f64,

    /// Name of the provider or dataset that produced the record
    #[serde(default)]
    pub source: String,
}

impl GeoRecord {
    /// Placeholder returned when no provider could locate `address`
    pub fn unknown(address: IpAddr) -> Self {
        Self {
            address,
            country_code: UNKNOWN_COUNTRY.to_string(),
            country_name: "Unknown".to_string(),
            region: String::new(),
            city: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            source: String::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.country_code == UNKNOWN_COUNTRY
    }
}
