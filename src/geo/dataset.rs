//! In-memory local dataset
//!
//! Maps address entries to fixed locations and answers lookups without any
//! network traffic. The first matching entry wins, so more specific entries
//! should be inserted before broader ones.

use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;

use super::models::GeoRecord;
use super::provider::{GeoLookup, ProviderError};
use crate::address::{validate_address_entry, AddressEntry, AddressError};
use crate::rules::{CountryCode, CountryCodeError};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset entry '{entry}': {source}")]
    Address {
        entry: String,
        #[source]
        source: AddressError,
    },
    #[error("dataset entry '{entry}': {source}")]
    Country {
        entry: String,
        #[source]
        source: CountryCodeError,
    },
}

/// One row of a dataset as it appears in configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetRow {
    pub network: String,
    pub country_code: String,
    #[serde(default)]
    pub country_name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StaticDataset {
    entries: Vec<(AddressEntry, GeoRecord)>,
}

impl StaticDataset {
    pub const NAME: &'static str = "local";

    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration rows, rejecting the first invalid one
    pub fn from_rows<I>(rows: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = DatasetRow>,
    {
        let mut dataset = Self::new();
        for row in rows {
            let entry = validate_address_entry(&row.network).map_err(|source| {
                DatasetError::Address {
                    entry: row.network.clone(),
                    source,
                }
            })?;
            let code = CountryCode::parse(&row.country_code).map_err(|source| {
                DatasetError::Country {
                    entry: row.network.clone(),
                    source,
                }
            })?;

            let template = GeoRecord {
                country_code: code.to_string(),
                country_name: row.country_name,
                region: row.region,
                city: row.city,
                latitude: row.latitude,
                longitude: row.longitude,
                ..GeoRecord::unknown(entry_anchor(&entry))
            };
            dataset.insert(entry, template);
        }
        Ok(dataset)
    }

    pub fn insert(&mut self, entry: AddressEntry, location: GeoRecord) {
        self.entries.push((entry, location));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry_anchor(entry: &AddressEntry) -> IpAddr {
    entry.network_info().first
}

#[async_trait]
impl GeoLookup for StaticDataset {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn lookup(&self, address: IpAddr) -> Result<GeoRecord, ProviderError> {
        self.entries
            .iter()
            .find(|(entry, _)| entry.contains(address))
            .map(|(_, template)| GeoRecord {
                address,
                source: Self::NAME.to_string(),
                ..template.clone()
            })
            .ok_or(ProviderError::NotFound(address))
    }
}
