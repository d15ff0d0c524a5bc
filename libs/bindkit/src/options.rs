//! Binding option strings (`includeNulls&cleanNoMatch=true`).

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Write an explicit `None` entry for keys without a match.
pub const INCLUDE_NULLS: &str = "includeNulls";
/// Do not record a field error for keys without a match.
pub const CLEAN_NO_MATCH: &str = "cleanNoMatch";

/// Parsed binding options.
///
/// Parsing is lenient: a segment that is not exactly one `key=value` pair is
/// dropped, and the last occurrence of a duplicated key wins. Flags such as
/// `includeNulls` are matched on presence; their value is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingOptions(BTreeMap<String, String>);

impl BindingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(raw: Option<&str>) -> Self {
        let mut map = BTreeMap::new();
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self(map);
        };

        for segment in raw.split('&') {
            let mut parts = segment.split('=');
            let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            map.insert(key.to_string(), value.trim().to_string());
        }

        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn include_nulls(&self) -> bool {
        self.contains(INCLUDE_NULLS)
    }

    pub fn clean_no_match(&self) -> bool {
        self.contains(CLEAN_NO_MATCH)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Options sorted by name and joined as `k=v&k=v`; used as grouping key.
    pub fn canonical_key(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl FromStr for BindingOptions {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(Some(s)))
    }
}

impl fmt::Display for BindingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_key())
    }
}
