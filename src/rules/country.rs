use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use super::regions;

/// Country code used when no location could be determined
pub const UNKNOWN_COUNTRY: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CountryCodeError {
    #[error("invalid country code '{0}': expected two ASCII letters")]
    Invalid(String),
    #[error("unknown country region '{0}'")]
    UnknownRegion(String),
}

/// ISO 3166-1 alpha-2 code, always stored uppercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Accepts two ASCII letters in either case
    pub fn parse(text: &str) -> Result<Self, CountryCodeError> {
        let trimmed = text.trim();
        if trimmed.len() != 2 || !trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(CountryCodeError::Invalid(text.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = CountryCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyMode {
    /// Only listed countries are allowed
    #[serde(alias = "whitelist")]
    AllowOnly,
    /// Listed countries are denied
    #[default]
    #[serde(alias = "blacklist")]
    DenyListed,
}

/// Country-level access policy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountryPolicy {
    pub mode: PolicyMode,
    countries: BTreeSet<CountryCode>,
}

impl CountryPolicy {
    pub fn new(mode: PolicyMode) -> Self {
        Self {
            mode,
            countries: BTreeSet::new(),
        }
    }

    /// Build a policy from textual codes, rejecting the first invalid one
    pub fn with_codes<I, S>(mode: PolicyMode, codes: I) -> Result<Self, CountryCodeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut policy = Self::new(mode);
        for code in codes {
            policy.insert(CountryCode::parse(code.as_ref())?);
        }
        Ok(policy)
    }

    pub fn insert(&mut self, code: CountryCode) -> bool {
        self.countries.insert(code)
    }

    pub fn remove(&mut self, code: &CountryCode) -> bool {
        self.countries.remove(code)
    }

    /// Add every member of a named region group, returning how many were new
    pub fn add_region(&mut self, region: &str) -> Result<usize, CountryCodeError> {
        let members = regions::members(region)
            .ok_or_else(|| CountryCodeError::UnknownRegion(region.to_string()))?;

        let mut added = 0;
        for code in members {
            if self.insert(CountryCode::parse(code)?) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Whether the resolved `country` is in the set.
    ///
    /// The `UNKNOWN` sentinel can never be stored, so it is never listed.
    pub fn lists(&self, country: &str) -> bool {
        self.countries.iter().any(|code| code.as_str() == country)
    }

    pub fn countries(&self) -> impl Iterator<Item = &CountryCode> {
        self.countries.iter()
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }
}
