//! Raw and canonical search queries
//!
//! `RawFilters` is what callers hand in: names mapped to loosely-typed values.
//! `SearchQuery` is the validated form, holding one tagged `FilterValue` per
//! recognised filter. Its canonical serialization doubles as the cache key.

use crate::filter::names;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Date format used for date-range bounds, both inbound and upstream.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// RAW INPUT
// ============================================================================

/// A loosely-typed filter value as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Number(u64),
    List(Vec<String>),
    Range {
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        to: Option<String>,
    },
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    pub fn range(from: Option<&str>, to: Option<&str>) -> Self {
        Self::Range {
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        }
    }

    /// Render for error messages.
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::List(items) => items.join(","),
            Self::Range { from, to } => format!(
                "{}..{}",
                from.as_deref().unwrap_or(""),
                to.as_deref().unwrap_or("")
            ),
        }
    }
}

/// Filter mapping as received from the front door.
pub type RawFilters = BTreeMap<String, RawValue>;

// ============================================================================
// CANONICAL VALUES
// ============================================================================

/// Inclusive date range; either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// `AREA[field]RANGE[from,to]`, open bounds rendered as `MIN`/`MAX`.
    pub fn to_advanced_clause(&self, area: &str) -> String {
        format!(
            "AREA[{}]RANGE[{},{}]",
            area,
            format_bound(self.from, "MIN"),
            format_bound(self.to, "MAX")
        )
    }

    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

fn format_bound(bound: Option<NaiveDate>, open: &str) -> String {
    bound
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| open.to_string())
}

/// A validated filter value, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum FilterValue {
    Text(String),
    Enum(String),
    MultiEnum(BTreeSet<String>),
    DateRange(DateRange),
}

impl FilterValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    fn canonical(&self) -> String {
        match self {
            Self::Text(s) => s.to_lowercase(),
            Self::Enum(v) => v.clone(),
            Self::MultiEnum(set) => set.iter().cloned().collect::<Vec<_>>().join("|"),
            Self::DateRange(range) => format!(
                "{}..{}",
                range
                    .from
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_default(),
                range
                    .to
                    .map(|d| d.format(DATE_FORMAT).to_string())
                    .unwrap_or_default()
            ),
        }
    }

    fn to_raw(&self) -> RawValue {
        match self {
            Self::Text(s) | Self::Enum(s) => RawValue::Text(s.clone()),
            Self::MultiEnum(set) => RawValue::List(set.iter().cloned().collect()),
            Self::DateRange(range) => RawValue::Range {
                from: range.from.map(|d| d.format(DATE_FORMAT).to_string()),
                to: range.to.map(|d| d.format(DATE_FORMAT).to_string()),
            },
        }
    }
}

// ============================================================================
// SEARCH QUERY
// ============================================================================

/// Validated query: recognised filter names mapped to canonical values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    filters: BTreeMap<String, FilterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page_size: Option<u32>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, name: impl Into<String>, value: FilterValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FilterValue) {
        self.filters.insert(name.into(), value);
    }

    pub fn set_page_size(&mut self, page_size: Option<u32>) {
        self.page_size = page_size;
    }

    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.filters.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FilterValue::as_text)
    }

    pub fn location(&self) -> Option<&str> {
        self.text(names::LOCATION)
    }

    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    pub fn effective_page_size(&self, default: u32) -> u32 {
        self.page_size.unwrap_or(default)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Stable, order-independent serialization of the filters.
    pub fn canonical(&self) -> String {
        self.filters
            .iter()
            .map(|(name, value)| format!("{}={}", name, value.canonical()))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Cache key: canonical filters plus the page size actually requested.
    pub fn cache_key(&self, default_page_size: u32) -> CacheKey {
        let canonical = self.canonical();
        let page_size = self.effective_page_size(default_page_size);
        if canonical.is_empty() {
            CacheKey(format!("{}={}", names::PAGE_SIZE, page_size))
        } else {
            CacheKey(format!("{}&{}={}", canonical, names::PAGE_SIZE, page_size))
        }
    }

    /// Back to the raw representation; normalizing the result yields `self`.
    pub fn to_raw(&self) -> RawFilters {
        let mut raw: RawFilters = self
            .filters
            .iter()
            .map(|(name, value)| (name.clone(), value.to_raw()))
            .collect();
        if let Some(page_size) = self.page_size {
            raw.insert(names::PAGE_SIZE.to_string(), RawValue::Number(u64::from(page_size)));
        }
        raw
    }
}

/// Canonical cache key for a search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short SHA-256 prefix for log lines.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..6])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Trim and collapse internal whitespace.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
