//! Trial records and search outcomes

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public study page on the registry website.
pub const STUDY_PAGE_BASE: &str = "https://clinicaltrials.gov/study";

static TRIAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^NCT\d{8}$").expect("Invalid trial id regex"));

/// Validate and canonicalize a registry identifier (`NCT` + 8 digits).
pub fn parse_trial_id(raw: &str) -> Result<String, ValidationError> {
    let id = raw.trim().to_uppercase();
    if TRIAL_ID.is_match(&id) {
        Ok(id)
    } else {
        Err(ValidationError::InvalidTrialId {
            value: raw.to_string(),
        })
    }
}

// ============================================================================
// TRIAL RECORD
// ============================================================================

/// One trial as read from the registry. Never mutated by the search layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub nct_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<u64>,
}

impl TrialRecord {
    pub fn new(nct_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            nct_id: nct_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn official_url(&self) -> String {
        format!("{}/{}", STUDY_PAGE_BASE, self.nct_id)
    }

    /// Minimal fields handed to the summarizer.
    pub fn summary_input(&self) -> SummaryInput {
        SummaryInput {
            id: self.nct_id.clone(),
            title: self.title.clone(),
            condition: self.condition.clone(),
            phase: self.phase.clone(),
            brief_description: self.brief_summary.clone(),
            status: self.status.clone(),
        }
    }
}

/// Input contract of the plain-language summarizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryInput {
    pub id: String,
    pub title: String,
    pub condition: Option<String>,
    pub phase: Option<String>,
    pub brief_description: Option<String>,
    pub status: Option<String>,
}

/// A trial with its plain-language summary attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTrial {
    #[serde(flatten)]
    pub trial: TrialRecord,
    pub plain_summary: String,
    pub official_url: String,
}

impl EnrichedTrial {
    pub fn new(trial: TrialRecord, plain_summary: impl Into<String>) -> Self {
        let official_url = trial.official_url();
        Self {
            trial,
            plain_summary: plain_summary.into(),
            official_url,
        }
    }
}

// ============================================================================
// STRATEGIES AND OUTCOMES
// ============================================================================

/// How the location filter was encoded for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyName {
    Primary,
    CityOnly,
    RegionExpanded,
}

impl StrategyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::CityOnly => "city-only",
            Self::RegionExpanded => "region-expanded",
        }
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream page as produced under a given strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStrategyResult {
    pub records: Vec<TrialRecord>,
    pub raw_count: Option<u64>,
    pub next_page_token: Option<String>,
    pub strategy: StrategyName,
}

impl SearchStrategyResult {
    pub fn empty(strategy: StrategyName) -> Self {
        Self {
            records: Vec::new(),
            raw_count: None,
            next_page_token: None,
            strategy,
        }
    }

    /// Count used to compare strategies.
    pub fn yield_count(&self) -> u64 {
        self.raw_count.unwrap_or(self.records.len() as u64)
    }

    pub fn has_more(&self) -> bool {
        self.next_page_token.is_some()
    }

    /// Whether `raw_count` can be taken at face value.
    pub fn total_is_reliable(&self) -> bool {
        let returned = self.records.len() as u64;
        match self.raw_count {
            None => false,
            Some(0) => self.records.is_empty() && !self.has_more(),
            Some(count) => count >= returned,
        }
    }
}

/// Detail level of an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    Detailed,
    CountOnly,
}

/// Result of a search as returned to the front door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    pub records: Vec<EnrichedTrial>,
    pub total_count: u64,
    pub accurate_total: bool,
    pub strategy_used: StrategyName,
    pub kind: ResultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl SearchOutcome {
    pub fn is_detailed(&self) -> bool {
        self.kind == ResultKind::Detailed
    }
}

/// Outcome plus cache provenance markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(flatten)]
    pub outcome: SearchOutcome,
    pub stale: bool,
    pub from_cache: bool,
}

/// Single-trial lookup result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialDetail {
    #[serde(flatten)]
    pub trial: TrialRecord,
    pub official_url: String,
    pub stale: bool,
    pub from_cache: bool,
}

impl TrialDetail {
    pub fn new(trial: TrialRecord, stale: bool, from_cache: bool) -> Self {
        let official_url = trial.official_url();
        Self {
            trial,
            official_url,
            stale,
            from_cache,
        }
    }
}
