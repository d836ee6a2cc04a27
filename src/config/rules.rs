//! Rules file loading
//!
//! A rules file (TOML, JSON or YAML, chosen by extension) holds the address
//! lists, the country policy, the override rules and the exemption policy.
//! `GEOGATE__`-prefixed environment variables override file values, e.g.
//! `GEOGATE__POLICY__MODE=allow-only`.
//!
//! Every entry is validated when the file is turned into a [`RuleSnapshot`];
//! the first invalid one rejects the whole file.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::address::{AddressError, AddressList, ListKind};
use crate::rules::{
    CountryCode, CountryCodeError, CountryPolicy, ExemptionPolicy, OverrideRule,
    OverrideRuleError, PolicyMode, RuleEffect, RuleKind, RuleSnapshot,
};

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("{list} list entry '{entry}': {source}")]
    ListEntry {
        list: ListKind,
        entry: String,
        source: AddressError,
    },
    #[error("country policy entry '{entry}': {source}")]
    Policy {
        entry: String,
        source: CountryCodeError,
    },
    #[error("override rule #{index} '{value}': {source}")]
    Override {
        index: usize,
        value: String,
        source: OverrideRuleError,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesFile {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
    /// Per-list cap, defaults to 10,000
    pub max_list_entries: Option<usize>,
    pub policy: PolicySection,
    pub overrides: Vec<OverrideSection>,
    pub exemptions: ExemptionPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySection {
    pub mode: PolicyMode,
    pub countries: Vec<String>,
    /// Region group keys such as `EU-27`, expanded into `countries`
    pub regions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideSection {
    pub kind: RuleKind,
    pub value: String,
    pub effect: RuleEffect,
    #[serde(default)]
    pub priority: i32,
}

/// Validated contents of a rules file
#[derive(Debug, Clone)]
pub struct LoadedRules {
    pub snapshot: RuleSnapshot,
    pub exemptions: ExemptionPolicy,
}

impl RulesFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix("GEOGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("allow")
                    .with_list_parse_key("deny")
                    .with_list_parse_key("policy.countries")
                    .with_list_parse_key("policy.regions")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read rules file {}", path.display()))?;

        settings
            .try_deserialize()
            .with_context(|| format!("failed to parse rules file {}", path.display()))
    }

    /// Load and validate in one step
    pub fn load_validated(path: &Path) -> anyhow::Result<LoadedRules> {
        let rules = Self::load(path)?
            .into_rules()
            .with_context(|| format!("invalid rules in {}", path.display()))?;

        info!(
            allow = rules.snapshot.lists.allow.len(),
            deny = rules.snapshot.lists.deny.len(),
            countries = rules.snapshot.policy.len(),
            overrides = rules.snapshot.overrides.len(),
            "Rules loaded from {}",
            path.display()
        );
        Ok(rules)
    }

    pub fn into_rules(self) -> Result<LoadedRules, RulesError> {
        let max_entries = self
            .max_list_entries
            .unwrap_or(crate::address::DEFAULT_MAX_ENTRIES);

        let mut snapshot = RuleSnapshot::default();
        snapshot.lists.allow = build_list(ListKind::Allow, &self.allow, max_entries)?;
        snapshot.lists.deny = build_list(ListKind::Deny, &self.deny, max_entries)?;
        snapshot.policy = build_policy(&self.policy)?;

        snapshot.overrides = self
            .overrides
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                OverrideRule::parse(rule.kind, &rule.value, rule.effect, rule.priority).map_err(
                    |source| RulesError::Override {
                        index,
                        value: rule.value.clone(),
                        source,
                    },
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LoadedRules {
            snapshot,
            exemptions: self.exemptions,
        })
    }
}

fn build_list(kind: ListKind, entries: &[String], max_entries: usize) -> Result<AddressList, RulesError> {
    let mut list = AddressList::with_max_entries(kind, max_entries);
    for entry in entries {
        match list.add(entry) {
            Ok(_) => {}
            Err(AddressError::Duplicate(normalized)) => {
                warn!(list = %kind, entry = %normalized, "Duplicate list entry ignored");
            }
            Err(source) => {
                return Err(RulesError::ListEntry {
                    list: kind,
                    entry: entry.clone(),
                    source,
                })
            }
        }
    }
    Ok(list)
}

fn build_policy(section: &PolicySection) -> Result<CountryPolicy, RulesError> {
    let mut policy = CountryPolicy::new(section.mode);

    for code in &section.countries {
        let parsed = CountryCode::parse(code).map_err(|source| RulesError::Policy {
            entry: code.clone(),
            source,
        })?;
        policy.insert(parsed);
    }

    for region in &section.regions {
        policy
            .add_region(region)
            .map_err(|source| RulesError::Policy {
                entry: region.clone(),
                source,
            })?;
    }

    Ok(policy)
}
