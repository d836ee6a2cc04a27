use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use super::entry::{validate_address_entry, AddressEntry, AddressError};

/// Default cap on entries per list
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    #[serde(alias = "whitelist")]
    Allow,
    #[serde(alias = "blacklist")]
    Deny,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Allow => f.write_str("allow"),
            ListKind::Deny => f.write_str("deny"),
        }
    }
}

/// Named set of address entries.
///
/// Entries are unique by normalized form. Order is kept for export only;
/// matching short-circuits on the first hit.
#[derive(Debug, Clone)]
pub struct AddressList {
    kind: ListKind,
    entries: Vec<AddressEntry>,
    max_entries: usize,
}

/// Outcome of a bulk import
#[derive(Debug, Default)]
pub struct ImportReport {
    pub added: usize,
    pub errors: Vec<(String, AddressError)>,
}

impl AddressList {
    pub fn new(kind: ListKind) -> Self {
        Self::with_max_entries(kind, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(kind: ListKind, max_entries: usize) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            max_entries,
        }
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    /// Validate `text` and add it
    pub fn add(&mut self, text: &str) -> Result<AddressEntry, AddressError> {
        let entry = validate_address_entry(text)?;
        self.add_entry(entry)?;
        Ok(entry)
    }

    pub fn add_entry(&mut self, entry: AddressEntry) -> Result<(), AddressError> {
        if self.entries.contains(&entry) {
            return Err(AddressError::Duplicate(entry.to_string()));
        }
        if self.entries.len() >= self.max_entries {
            return Err(AddressError::ListFull(self.max_entries));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Remove the entry whose normalized form matches `text`
    pub fn remove(&mut self, text: &str) -> Result<AddressEntry, AddressError> {
        let entry = validate_address_entry(text)?;
        let position = self
            .entries
            .iter()
            .position(|e| *e == entry)
            .ok_or_else(|| AddressError::NotFound(entry.to_string()))?;
        Ok(self.entries.remove(position))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether any entry covers `address`
    pub fn matches(&self, address: IpAddr) -> bool {
        self.entries.iter().any(|entry| entry.contains(address))
    }

    /// First entry covering `address`
    pub fn find(&self, address: IpAddr) -> Option<&AddressEntry> {
        self.entries.iter().find(|entry| entry.contains(address))
    }

    /// Add many entries, collecting per-entry failures instead of stopping.
    ///
    /// With `replace` the list is cleared first.
    pub fn import<I, S>(&mut self, texts: I, replace: bool) -> ImportReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if replace {
            self.clear();
        }

        let mut report = ImportReport::default();
        for text in texts {
            let text = text.as_ref();
            match self.add(text) {
                Ok(_) => report.added += 1,
                Err(err) => report.errors.push((text.to_string(), err)),
            }
        }
        report
    }

    /// Normalized textual form of every entry, in insertion order
    pub fn export(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

/// The allow and deny lists consulted before any country rule
#[derive(Debug, Clone)]
pub struct AddressLists {
    pub allow: AddressList,
    pub deny: AddressList,
}

impl Default for AddressLists {
    fn default() -> Self {
        Self {
            allow: AddressList::new(ListKind::Allow),
            deny: AddressList::new(ListKind::Deny),
        }
    }
}

impl AddressLists {
    pub fn get(&self, kind: ListKind) -> &AddressList {
        match kind {
            ListKind::Allow => &self.allow,
            ListKind::Deny => &self.deny,
        }
    }

    pub fn get_mut(&mut self, kind: ListKind) -> &mut AddressList {
        match kind {
            ListKind::Allow => &mut self.allow,
            ListKind::Deny => &mut self.deny,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_match() {
        let mut list = AddressList::new(ListKind::Deny);
        list.add("192.168.1.0/24").unwrap();
        list.add("10.0.0.1-10.0.0.9").unwrap();
        list.add("2001:db8::1").unwrap();

        assert!(list.matches("192.168.1.1".parse().unwrap()));
        assert!(list.matches("10.0.0.5".parse().unwrap()));
        assert!(list.matches("2001:db8::1".parse().unwrap()));
        assert!(!list.matches("192.168.2.1".parse().unwrap()));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_duplicates_by_normalized_form() {
        let mut list = AddressList::new(ListKind::Allow);
        list.add("192.168.1.0/24").unwrap();
        let err = list.add(" 192.168.1.99/24 ").unwrap_err();
        assert_eq!(err, AddressError::Duplicate("192.168.1.0/24".to_string()));

        list.add("2001:db8::a").unwrap();
        assert!(list.add("2001:DB8:0::A").is_err());
    }

    #[test]
    fn test_max_entries() {
        let mut list = AddressList::with_max_entries(ListKind::Deny, 2);
        list.add("1.1.1.1").unwrap();
        list.add("1.1.1.2").unwrap();
        assert_eq!(list.add("1.1.1.3"), Err(AddressError::ListFull(2)));
    }

    #[test]
    fn test_remove() {
        let mut list = AddressList::new(ListKind::Deny);
        list.add("10.0.0.0/8").unwrap();
        assert!(list.remove("10.1.2.3/8").is_ok());
        assert!(list.is_empty());
        assert!(matches!(
            list.remove("10.0.0.0/8"),
            Err(AddressError::NotFound(_))
        ));
    }

    #[test]
    fn test_import_collects_errors() {
        let mut list = AddressList::new(ListKind::Deny);
        list.add("8.8.8.8").unwrap();

        let report = list.import(["1.1.1.1", "not-an-ip", "8.8.8.8", "10.0.0.0/33"], false);
        assert_eq!(report.added, 1);
        assert_eq!(report.errors.len(), 3);
        assert_eq!(list.len(), 2);

        let report = list.import(["9.9.9.9"], true);
        assert_eq!(report.added, 1);
        assert_eq!(list.export(), vec!["9.9.9.9".to_string()]);
    }

    #[test]
    fn test_export_is_normalized() {
        let mut list = AddressList::new(ListKind::Allow);
        list.add(" 10.0.0.7/24").unwrap();
        list.add("2001:DB8::1").unwrap();
        assert_eq!(list.export(), vec!["10.0.0.0/24", "2001:db8::1"]);
    }
}
