//! TrialScope Test Utilities
//!
//! Shared test infrastructure for the TrialScope workspace:
//! - A scripted fake registry that records every request
//! - Mock summarizers
//! - Proptest generators for filter mappings
//! - Fixtures and custom assertions

pub use trialscope_core::{
    names, params, RawFilters, RawValue, RegistryPage, SearchConfig, SearchOutcome, SummaryInput,
    TrialRecord, TrialScopeError, TrialScopeResult, UpstreamError, UpstreamRequest,
    UpstreamResult,
};
pub use trialscope_registry::{RegistryClient, TrialSummarizer};

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// REQUEST MATCHERS
// ============================================================================

/// Predicate over upstream requests, used to pick a scripted reply.
#[derive(Clone)]
pub struct Matcher(Arc<dyn Fn(&UpstreamRequest) -> bool + Send + Sync>);

impl Matcher {
    pub fn new(f: impl Fn(&UpstreamRequest) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn matches(&self, request: &UpstreamRequest) -> bool {
        (self.0)(request)
    }

    pub fn and(self, other: Matcher) -> Matcher {
        Matcher::new(move |r| self.matches(r) && other.matches(r))
    }
}

pub fn any_request() -> Matcher {
    Matcher::new(|_| true)
}

pub fn has_param(name: &'static str) -> Matcher {
    Matcher::new(move |r| r.has_param(name))
}

pub fn lacks_param(name: &'static str) -> Matcher {
    Matcher::new(move |r| !r.has_param(name))
}

pub fn param_eq(name: &'static str, value: impl Into<String>) -> Matcher {
    let value = value.into();
    Matcher::new(move |r| r.param(name) == Some(value.as_str()))
}

pub fn param_contains(name: &'static str, needle: impl Into<String>) -> Matcher {
    let needle = needle.into();
    Matcher::new(move |r| r.param(name).is_some_and(|v| v.contains(needle.as_str())))
}

pub fn page_size(size: u32) -> Matcher {
    param_eq(params::PAGE_SIZE, size.to_string())
}

/// Count probes carry `fields=NCTId`.
pub fn count_probe() -> Matcher {
    has_param(params::FIELDS)
}

pub fn data_page() -> Matcher {
    lacks_param(params::FIELDS)
}

// ============================================================================
// SCRIPTED REPLIES
// ============================================================================

#[derive(Debug, Clone)]
enum ReplyOutcome {
    Page(RegistryPage),
    Fail(UpstreamError),
}

/// What the scripted registry answers for a matched request.
#[derive(Debug, Clone)]
pub struct Reply {
    outcome: ReplyOutcome,
    delay: Option<Duration>,
}

impl Reply {
    /// Page of `n` fixture records, no total, no token.
    pub fn page(n: usize) -> Self {
        Self::records(fixtures::trials(n))
    }

    pub fn records(records: Vec<TrialRecord>) -> Self {
        Self {
            outcome: ReplyOutcome::Page(RegistryPage::new(records)),
            delay: None,
        }
    }

    pub fn empty() -> Self {
        Self::records(Vec::new()).total(0)
    }

    pub fn fail(err: UpstreamError) -> Self {
        Self {
            outcome: ReplyOutcome::Fail(err),
            delay: None,
        }
    }

    pub fn unavailable() -> Self {
        Self::fail(UpstreamError::Unavailable {
            reason: "scripted outage".to_string(),
        })
    }

    pub fn rejected() -> Self {
        Self::fail(UpstreamError::Rejected {
            status: 400,
            message: "scripted rejection".to_string(),
            query: String::new(),
        })
    }

    pub fn total(mut self, total: u64) -> Self {
        if let ReplyOutcome::Page(page) = &mut self.outcome {
            page.total_count = Some(total);
        }
        self
    }

    pub fn token(mut self) -> Self {
        if let ReplyOutcome::Page(page) = &mut self.outcome {
            page.next_page_token = Some("next-page".to_string());
        }
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct Rule {
    matcher: Matcher,
    reply: Reply,
}

// ============================================================================
// SCRIPTED REGISTRY
// ============================================================================

/// Fake registry answering from an ordered list of rules.
///
/// The first rule whose matcher accepts a request supplies the reply; with
/// no match the fallback (an empty page with total 0) is used. Every request
/// is recorded.
pub struct ScriptedRegistry {
    rules: Mutex<Vec<Rule>>,
    fallback: Mutex<Reply>,
    studies: Mutex<HashMap<String, TrialRecord>>,
    study_failure: Mutex<Option<UpstreamError>>,
    log: Mutex<Vec<UpstreamRequest>>,
    calls: AtomicUsize,
    study_calls: AtomicUsize,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            fallback: Mutex::new(Reply::empty()),
            studies: Mutex::new(HashMap::new()),
            study_failure: Mutex::new(None),
            log: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            study_calls: AtomicUsize::new(0),
        }
    }

    pub fn on(self, matcher: Matcher, reply: Reply) -> Self {
        self.push_rule(matcher, reply);
        self
    }

    pub fn otherwise(self, reply: Reply) -> Self {
        *lock(&self.fallback) = reply;
        self
    }

    pub fn with_study(self, record: TrialRecord) -> Self {
        lock(&self.studies).insert(record.nct_id.clone(), record);
        self
    }

    /// Add a rule after construction; it takes priority over earlier ones.
    pub fn prepend_rule(&self, matcher: Matcher, reply: Reply) {
        lock(&self.rules).insert(0, Rule { matcher, reply });
    }

    pub fn push_rule(&self, matcher: Matcher, reply: Reply) {
        lock(&self.rules).push(Rule { matcher, reply });
    }

    /// Make every study lookup fail with `err` (or succeed again with `None`).
    pub fn fail_studies(&self, err: Option<UpstreamError>) {
        *lock(&self.study_failure) = err;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn study_call_count(&self) -> usize {
        self.study_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        lock(&self.log).clone()
    }

    pub fn requests_matching(&self, matcher: &Matcher) -> Vec<UpstreamRequest> {
        lock(&self.log)
            .iter()
            .filter(|r| matcher.matches(r))
            .cloned()
            .collect()
    }

    fn reply_for(&self, request: &UpstreamRequest) -> Reply {
        lock(&self.rules)
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| lock(&self.fallback).clone())
    }
}

impl Default for ScriptedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn search(&self, request: &UpstreamRequest) -> UpstreamResult<RegistryPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.log).push(request.clone());

        let reply = self.reply_for(request);
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        match reply.outcome {
            ReplyOutcome::Page(page) => Ok(page),
            ReplyOutcome::Fail(err) => Err(err),
        }
    }

    async fn study(&self, trial_id: &str, _timeout: Duration) -> UpstreamResult<Option<TrialRecord>> {
        self.study_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = lock(&self.study_failure).clone() {
            return Err(err);
        }
        Ok(lock(&self.studies).get(trial_id).cloned())
    }
}

// ============================================================================
// MOCK SUMMARIZERS
// ============================================================================

/// Summarizer returning `"{prefix} {id}"`; fails for selected identifiers.
#[derive(Debug, Default)]
pub struct MockSummarizer {
    prefix: String,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::with_prefix("Summary of")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            failing: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrialSummarizer for MockSummarizer {
    async fn summarize(&self, input: &SummaryInput) -> TrialScopeResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&input.id) {
            return Err(TrialScopeError::Summarization {
                reason: format!("mock failure for {}", input.id),
            });
        }
        Ok(format!("{} {}", self.prefix, input.id))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Summarizer that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingSummarizer;

#[async_trait]
impl TrialSummarizer for FailingSummarizer {
    async fn summarize(&self, input: &SummaryInput) -> TrialScopeResult<String> {
        Err(TrialScopeError::Summarization {
            reason: format!("summarizer offline ({})", input.id),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for TrialScope inputs.

    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use trialscope_core::{FilterSpecTable, ValueKind};

    /// Free text with irregular spacing and casing.
    pub fn arb_text() -> impl Strategy<Value = String> {
        "[A-Za-z]{1,10}( {1,3}[A-Za-z]{1,10}){0,2}".prop_map(|s| format!(" {} ", s))
    }

    pub fn arb_trial_id() -> impl Strategy<Value = String> {
        (0u32..100_000_000).prop_map(|n| format!("NCT{:08}", n))
    }

    pub fn arb_trial_id_list() -> impl Strategy<Value = String> {
        prop::collection::vec(arb_trial_id(), 1..4).prop_map(|ids| {
            ids.into_iter()
                .map(|id| id.to_lowercase())
                .collect::<Vec<_>>()
                .join(" , ")
        })
    }

    /// Locations in the shapes callers send: city, "city, ST", "city, State", "city ST".
    pub fn arb_location() -> impl Strategy<Value = String> {
        let cities = prop::sample::select(vec!["Boston", "los angeles", "New York", "Austin"]);
        let regions = prop::sample::select(vec!["MA", "ca", "New York", "texas"]);
        (cities, proptest::option::of(regions), any::<bool>()).prop_map(|(city, region, comma)| {
            match region {
                Some(region) if comma => format!("{}, {}", city, region),
                Some(region) => format!("{} {}", city, region),
                None => city.to_string(),
            }
        })
    }

    pub fn arb_date() -> impl Strategy<Value = NaiveDate> {
        (2000i32..2030, 1u32..13, 1u32..29)
            .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default())
    }

    pub fn arb_date_range() -> impl Strategy<Value = RawValue> {
        (proptest::option::of(arb_date()), proptest::option::of(arb_date())).prop_map(|(a, b)| {
            let (from, to) = match (a, b) {
                (Some(a), Some(b)) if a > b => (Some(b), Some(a)),
                other => other,
            };
            RawValue::Range {
                from: from.map(|d| d.format("%Y-%m-%d").to_string()),
                to: to.map(|d| d.format("%Y-%m-%d").to_string()),
            }
        })
    }

    /// Non-empty subset of a filter's allowed values, randomly cased.
    pub fn arb_enum_values(filter: &'static str) -> BoxedStrategy<Vec<String>> {
        let values: Vec<&'static str> = FilterSpecTable::get(filter)
            .map(|spec| spec.allowed.iter().map(|v| v.value).collect())
            .unwrap_or_default();
        let len = values.len().max(1);
        (prop::sample::subsequence(values, 1..=len), any::<bool>())
            .prop_map(|(picked, lower)| {
                picked
                    .into_iter()
                    .map(|v| if lower { v.to_lowercase() } else { v.to_string() })
                    .collect()
            })
            .boxed()
    }

    fn arb_value_for(name: &'static str, kind: ValueKind) -> BoxedStrategy<RawValue> {
        match (name, kind) {
            (names::STUDY_IDS, _) => arb_trial_id_list().prop_map(RawValue::Text).boxed(),
            (names::LOCATION, _) => arb_location().prop_map(RawValue::Text).boxed(),
            (_, ValueKind::Text) => arb_text().prop_map(RawValue::Text).boxed(),
            (_, ValueKind::Enum) => arb_enum_values(name)
                .prop_map(|mut v| RawValue::Text(v.swap_remove(0)))
                .boxed(),
            (_, ValueKind::MultiEnum) => (arb_enum_values(name), any::<bool>())
                .prop_map(|(values, as_list)| {
                    if as_list {
                        RawValue::List(values)
                    } else {
                        RawValue::Text(values.join(", "))
                    }
                })
                .boxed(),
            (_, ValueKind::DateRange) => arb_date_range().boxed(),
        }
    }

    /// Valid filter mappings drawn from the whole filter table.
    pub fn arb_raw_filters() -> impl Strategy<Value = RawFilters> {
        let per_filter: Vec<BoxedStrategy<Option<(String, RawValue)>>> = FilterSpecTable::all()
            .iter()
            .map(|spec| {
                let name = spec.name;
                proptest::option::weighted(0.4, arb_value_for(name, spec.kind))
                    .prop_map(move |v| v.map(|v| (name.to_string(), v)))
                    .boxed()
            })
            .collect();

        (per_filter, proptest::option::of(1u32..=1000)).prop_map(|(entries, page_size)| {
            let mut raw: RawFilters = entries.into_iter().flatten().collect();
            if let Some(size) = page_size {
                raw.insert(names::PAGE_SIZE.to_string(), RawValue::Number(u64::from(size)));
            }
            raw
        })
    }

    /// Page sizes for count-probe replies.
    pub fn arb_upstream_total() -> impl Strategy<Value = u64> {
        prop_oneof![0u64..20, 0u64..2_000, 0u64..50_000]
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and configurations.

    use super::*;

    /// Minimal trial with the given identifier.
    pub fn trial(id: impl Into<String>) -> TrialRecord {
        let id = id.into();
        TrialRecord {
            title: format!("Study {}", id),
            condition: Some("Lung Cancer".to_string()),
            status: Some("RECRUITING".to_string()),
            phase: Some("PHASE2".to_string()),
            study_type: Some("INTERVENTIONAL".to_string()),
            location: Some("Los Angeles, California".to_string()),
            sponsor: Some("Example Sponsor".to_string()),
            brief_summary: Some("A study used in tests.".to_string()),
            nct_id: id,
            ..TrialRecord::default()
        }
    }

    /// `n` trials with sequential identifiers.
    pub fn trials(n: usize) -> Vec<TrialRecord> {
        (0..n).map(|i| trial(format!("NCT{:08}", i + 1))).collect()
    }

    pub fn lung_cancer_screening() -> TrialRecord {
        TrialRecord {
            title: "Lung Cancer Screening With Low-Dose CT".to_string(),
            ..trial("NCT03451162")
        }
    }

    /// Defaults with short budgets for tests.
    pub fn test_config() -> SearchConfig {
        SearchConfig {
            data_timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(1),
            ..SearchConfig::default()
        }
    }

    pub fn raw(pairs: &[(&str, &str)]) -> RawFilters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), RawValue::text(*v)))
            .collect()
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for TrialScope results.

    use super::*;
    use trialscope_core::ResultKind;

    #[track_caller]
    pub fn assert_invalid_filter<T: std::fmt::Debug>(result: &TrialScopeResult<T>) {
        match result {
            Err(TrialScopeError::InvalidFilter { .. }) => {}
            other => panic!("Expected InvalidFilter, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_service_unavailable<T: std::fmt::Debug>(result: &TrialScopeResult<T>) {
        match result {
            Err(TrialScopeError::ServiceUnavailable { .. }) => {}
            other => panic!("Expected ServiceUnavailable, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &TrialScopeResult<T>, trial_id: &str) {
        match result {
            Err(TrialScopeError::NotFound { trial_id: id }) => {
                assert_eq!(id, trial_id, "Wrong trial id in NotFound error");
            }
            other => panic!("Expected NotFound for {}, got: {:?}", trial_id, other),
        }
    }

    /// Count-only outcome with the given total and no records.
    #[track_caller]
    pub fn assert_count_only(outcome: &SearchOutcome, total: u64) {
        assert_eq!(outcome.kind, ResultKind::CountOnly, "outcome: {:?}", outcome);
        assert_eq!(outcome.total_count, total);
        assert!(outcome.records.is_empty(), "count-only outcome carried records");
        assert!(outcome.note.is_some(), "count-only outcome without a note");
    }

    /// Detailed outcome whose records all carry a summary.
    #[track_caller]
    pub fn assert_detailed(outcome: &SearchOutcome, records: usize) {
        assert_eq!(outcome.kind, ResultKind::Detailed, "outcome: {:?}", outcome);
        assert_eq!(outcome.records.len(), records);
        assert!(outcome.total_count >= outcome.records.len() as u64);
        for record in &outcome.records {
            assert!(!record.plain_summary.is_empty(), "missing summary for {}", record.trial.nct_id);
        }
    }
}
