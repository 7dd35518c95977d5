//! Search service
//!
//! Ties the pipeline together: normalize, consult the cache, and on a miss
//! run the strategy selector, count estimation, classification and
//! enrichment. Upstream failures are answered from the cache when an entry
//! exists and otherwise surface as `ServiceUnavailable`.

use crate::classifier::ResultClassifier;
use crate::enrichment::Enricher;
use crate::estimator::{CountEstimate, CountEstimator, ProbeSample};
use crate::executor::QueryExecutor;
use crate::normalizer::ParameterNormalizer;
use crate::strategy::LocationStrategySelector;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trialscope_cache::{CacheConfig, CacheStats, Clock, ResponseCache, SystemClock};
use trialscope_core::{
    parse_trial_id, FilterDescription, FilterSpecTable, RawFilters, ResultKind, SearchConfig,
    SearchOutcome, SearchQuery, SearchResponse, TrialDetail, TrialRecord, TrialScopeError,
    TrialScopeResult, UpstreamError, UpstreamResult,
};
use trialscope_registry::{RegistryClient, RequestStats, RequestTracker, TrialSummarizer};

/// Cache and upstream counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub searches: CacheStats,
    pub trials: CacheStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream: Option<RequestStats>,
}

/// Entry point for searches and trial lookups.
pub struct SearchService {
    config: SearchConfig,
    normalizer: ParameterNormalizer,
    executor: QueryExecutor,
    selector: LocationStrategySelector,
    estimator: CountEstimator,
    classifier: ResultClassifier,
    enricher: Enricher,
    registry: Arc<dyn RegistryClient>,
    searches: Arc<ResponseCache<SearchOutcome>>,
    trials: Arc<ResponseCache<TrialRecord>>,
    tracker: Option<Arc<RequestTracker>>,
}

impl SearchService {
    /// Build the pipeline from a validated configuration.
    pub fn new(
        config: SearchConfig,
        registry: Arc<dyn RegistryClient>,
        summarizer: Arc<dyn TrialSummarizer>,
    ) -> TrialScopeResult<Self> {
        config.validate()?;
        let (searches, trials) = build_caches(&config, Arc::new(SystemClock));

        Ok(Self {
            normalizer: ParameterNormalizer::from_config(&config),
            executor: QueryExecutor::new(Arc::clone(&registry), &config),
            selector: LocationStrategySelector::from_config(&config),
            estimator: CountEstimator::from_config(&config),
            classifier: ResultClassifier::from_config(&config),
            enricher: Enricher::new(summarizer, config.data_timeout),
            registry,
            searches,
            trials,
            tracker: None,
            config,
        })
    }

    /// Replace both caches with fresh ones reading time from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let (searches, trials) = build_caches(&self.config, clock);
        self.searches = searches;
        self.trials = trials;
        self
    }

    /// Share caches with other services in the same process.
    pub fn with_caches(
        mut self,
        searches: Arc<ResponseCache<SearchOutcome>>,
        trials: Arc<ResponseCache<TrialRecord>>,
    ) -> Self {
        self.searches = searches;
        self.trials = trials;
        self
    }

    /// Report this tracker's counters from [`SearchService::stats`].
    pub fn with_tracker(mut self, tracker: Arc<RequestTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Catalogue of recognised filters.
    pub fn available_filters(&self) -> Vec<FilterDescription> {
        FilterSpecTable::catalog()
    }

    // ========================================================================
    // SEARCH
    // ========================================================================

    /// Normalize `raw` and run the search.
    pub async fn search(&self, raw: &RawFilters) -> TrialScopeResult<SearchResponse> {
        let (query, warnings) = self.normalizer.normalize(raw).into_result()?;
        for warning in &warnings {
            warn!(warning = %warning, "filter normalization");
        }
        self.search_query(&query).await
    }

    /// Run an already-normalized query.
    pub async fn search_query(&self, query: &SearchQuery) -> TrialScopeResult<SearchResponse> {
        let key = query.cache_key(self.config.default_page_size);
        let read = self
            .searches
            .get_or_resolve(key.as_str(), || self.resolve(query))
            .await
            .map_err(|err| {
                warn!(key = %key.fingerprint(), error = %err, "search failed with nothing cached");
                TrialScopeError::service_unavailable(err)
            })?;

        let stale = read.is_stale();
        let from_cache = read.was_cache_hit();
        if stale {
            warn!(
                key = %key.fingerprint(),
                age_secs = read.staleness().as_secs(),
                "serving stale search result"
            );
        }

        Ok(SearchResponse {
            outcome: read.into_value(),
            stale,
            from_cache,
        })
    }

    async fn resolve(&self, query: &SearchQuery) -> UpstreamResult<SearchOutcome> {
        let page_size = query.effective_page_size(self.config.default_page_size);
        let selection = self.selector.run(&self.executor, query, page_size).await?;
        let note = selection.note();
        let strategy_used = selection.strategy_used();
        let returned = selection.chosen.result.records.len() as u64;

        let estimate = match CountEstimator::direct(&selection.chosen.result) {
            Some(estimate) => estimate,
            None => {
                debug!(returned, "upstream total unreliable, sampling");
                let executor = &self.executor;
                let strategy = &selection.chosen.strategy;
                self.estimator
                    .estimate(returned, move |size| async move {
                        executor.probe(query, strategy, size).await.map(ProbeSample::from)
                    })
                    .await
            }
        };
        let CountEstimate { total, accurate } = estimate;
        let total = total.max(returned);
        let kind = self.classifier.classify(total);

        let mut notes: Vec<String> = note.into_iter().collect();
        let records = match kind {
            ResultKind::Detailed => {
                let mut records = selection.chosen.result.records;
                if returned < total {
                    debug!(returned, total, "detailed result spans pages, fetching the rest");
                    let size = total.min(u64::from(self.config.max_page_size)) as u32;
                    let full = self
                        .executor
                        .execute(query, &selection.chosen.strategy, size)
                        .await?;
                    records = full.records;
                }
                self.enricher.enrich(records).await
            }
            ResultKind::CountOnly => {
                let count = if accurate {
                    total.to_string()
                } else {
                    format!("at least {}", total)
                };
                notes.push(format!(
                    "Large result set ({} trials). Use more specific filters to see trial details.",
                    count
                ));
                Vec::new()
            }
        };

        info!(
            total,
            accurate,
            strategy = %strategy_used,
            kind = ?kind,
            "search resolved"
        );

        Ok(SearchOutcome {
            records,
            total_count: total,
            accurate_total: accurate,
            strategy_used,
            kind,
            note: (!notes.is_empty()).then(|| notes.join(" ")),
        })
    }

    // ========================================================================
    // TRIAL LOOKUP
    // ========================================================================

    /// Fetch one trial by identifier.
    pub async fn trial(&self, trial_id: &str) -> TrialScopeResult<TrialDetail> {
        let id = parse_trial_id(trial_id)?;
        let read = self
            .trials
            .get_or_resolve(&id, || self.fetch_trial(&id))
            .await
            .map_err(|err| match err {
                TrialScopeError::Upstream(source) => TrialScopeError::service_unavailable(source),
                other => other,
            })?;

        let stale = read.is_stale();
        let from_cache = read.was_cache_hit();
        Ok(TrialDetail::new(read.into_value(), stale, from_cache))
    }

    async fn fetch_trial(&self, id: &str) -> TrialScopeResult<TrialRecord> {
        let budget = self.config.data_timeout;
        let found = match tokio::time::timeout(budget, self.registry.study(id, budget)).await {
            Ok(result) => result?,
            Err(_) => return Err(UpstreamError::Timeout { budget }.into()),
        };
        found.ok_or_else(|| TrialScopeError::NotFound {
            trial_id: id.to_string(),
        })
    }

    // ========================================================================
    // STATISTICS
    // ========================================================================

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            searches: self.searches.stats(),
            trials: self.trials.stats(),
            upstream: self.tracker.as_ref().map(|t| t.snapshot()),
        }
    }
}

fn build_caches(
    config: &SearchConfig,
    clock: Arc<dyn Clock>,
) -> (Arc<ResponseCache<SearchOutcome>>, Arc<ResponseCache<TrialRecord>>) {
    let base = CacheConfig::new().with_ttl(config.cache_ttl);
    (
        Arc::new(ResponseCache::with_clock(
            base.clone().with_name("searches"),
            Arc::clone(&clock),
        )),
        Arc::new(ResponseCache::with_clock(base.with_name("trials"), clock)),
    )
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("normalizer", &self.normalizer)
            .field("executor", &self.executor)
            .field("selector", &self.selector)
            .field("estimator", &self.estimator)
            .field("classifier", &self.classifier)
            .field("enricher", &self.enricher)
            .field("searches", &self.searches)
            .field("trials", &self.trials)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialscope_cache::ManualClock;
    use trialscope_test_utils::assertions::{assert_invalid_filter, assert_not_found, assert_service_unavailable};
    use trialscope_test_utils::fixtures::{lung_cancer_screening, raw, test_config};
    use trialscope_test_utils::{any_request, MockSummarizer, Reply, ScriptedRegistry};

    fn service(registry: Arc<ScriptedRegistry>) -> SearchService {
        SearchService::new(test_config(), registry, Arc::new(MockSummarizer::new())).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SearchConfig {
            default_page_size: 0,
            ..test_config()
        };
        let result = SearchService::new(
            config,
            Arc::new(ScriptedRegistry::new()),
            Arc::new(MockSummarizer::new()),
        );
        assert!(matches!(result, Err(TrialScopeError::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_filter_never_reaches_upstream() {
        let registry = Arc::new(ScriptedRegistry::new());
        let result = service(registry.clone())
            .search(&raw(&[("phase", "PHASE9")]))
            .await;
        assert_invalid_filter(&result);
        assert_eq!(registry.call_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_matches_is_not_an_error() {
        let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::empty()));
        let response = service(registry).search(&raw(&[("condition", "nothing")])).await.unwrap();
        assert_eq!(response.outcome.total_count, 0);
        assert!(response.outcome.accurate_total);
        assert!(response.outcome.is_detailed());
        assert!(response.outcome.records.is_empty());
    }

    #[tokio::test]
    async fn test_unreliable_total_on_last_page_counts_records() {
        let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::page(7)));
        let response = service(registry.clone()).search(&raw(&[("condition", "rare")])).await.unwrap();
        assert_eq!(response.outcome.total_count, 7);
        assert!(response.outcome.accurate_total);
        assert_eq!(response.outcome.records.len(), 7);
        assert_eq!(registry.call_count(), 1);
    }

    #[tokio::test]
    async fn test_outage_without_cache_is_service_unavailable() {
        let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::unavailable()));
        let result = service(registry).search(&raw(&[("condition", "asthma")])).await;
        assert_service_unavailable(&result);
    }

    #[tokio::test]
    async fn test_trial_lookup() {
        let registry = Arc::new(ScriptedRegistry::new().with_study(lung_cancer_screening()));
        let service = service(registry.clone());

        let detail = service.trial("nct03451162").await.unwrap();
        assert_eq!(detail.trial.nct_id, "NCT03451162");
        assert_eq!(detail.official_url, "https://clinicaltrials.gov/study/NCT03451162");
        assert!(!detail.from_cache);

        let again = service.trial("NCT03451162").await.unwrap();
        assert!(again.from_cache);
        assert_eq!(registry.study_call_count(), 1);
    }

    #[tokio::test]
    async fn test_trial_lookup_errors() {
        let registry = Arc::new(ScriptedRegistry::new());
        let service = service(registry.clone());

        assert_invalid_filter(&service.trial("12345").await);
        assert_not_found(&service.trial("NCT00000000").await, "NCT00000000");

        registry.fail_studies(Some(UpstreamError::Unavailable { reason: "down".into() }));
        assert_service_unavailable(&service.trial("NCT00000001").await);
    }

    #[tokio::test]
    async fn test_stale_trial_served_during_outage() {
        let clock = Arc::new(ManualClock::new());
        let registry = Arc::new(ScriptedRegistry::new().with_study(lung_cancer_screening()));
        let service = service(registry.clone()).with_clock(clock.clone());

        service.trial("NCT03451162").await.unwrap();
        clock.advance(std::time::Duration::from_secs(301));
        registry.fail_studies(Some(UpstreamError::Unavailable { reason: "down".into() }));

        let detail = service.trial("NCT03451162").await.unwrap();
        assert!(detail.stale);
        assert_eq!(service.stats().trials.stale_served, 1);
    }

    #[tokio::test]
    async fn test_stats_include_tracker() {
        let tracker = Arc::new(RequestTracker::new());
        tracker.record_request();
        let registry = Arc::new(ScriptedRegistry::new());
        let service = service(registry).with_tracker(tracker);

        let stats = service.stats();
        assert_eq!(stats.upstream.map(|s| s.requests), Some(1));
        let value = serde_json::to_value(&stats).unwrap();
        assert!(value.get("searches").is_some());
    }

    #[test]
    fn test_available_filters() {
        let service = service(Arc::new(ScriptedRegistry::new()));
        let filters = service.available_filters();
        assert!(filters.iter().any(|f| f.name == "studyStatus"));
    }
}
