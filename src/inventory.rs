//! Point-in-time records of installed package versions and their diffs.

use crate::error::Result;
use crate::utils::string_utils::normalize_pkg_name;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Version before and after, `None` meaning "not installed"
pub type Change = (Option<String>, Option<String>);

/// Installed packages keyed by normalized name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory(BTreeMap<String, String>);

#[derive(Deserialize)]
struct ListEntry {
    name: String,
    version: String,
}

impl Inventory {
    /// Parse the output of `pip list --format=json`
    pub fn from_pip_json(stdout: &str) -> Result<Self> {
        let entries: Vec<ListEntry> = serde_json::from_str(stdout.trim())?;
        Ok(entries.into_iter().map(|e| (e.name, e.version)).collect())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&normalize_pkg_name(name)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for Inventory {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(n, v)| (normalize_pkg_name(n.as_ref()), v.into()))
                .collect(),
        )
    }
}

/// Every package whose version differs between the two snapshots
pub fn diff(before: &Inventory, after: &Inventory) -> BTreeMap<String, Change> {
    before
        .names()
        .chain(after.names())
        .filter_map(|name| {
            let old = before.0.get(name);
            let new = after.0.get(name);
            (old != new).then(|| (name.to_string(), (old.cloned(), new.cloned())))
        })
        .collect()
}
