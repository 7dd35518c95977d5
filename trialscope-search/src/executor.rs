//! Query execution
//!
//! Builds one upstream request from a canonical query by walking the filter
//! table, and issues it with the timeout budget of its kind.

use crate::strategy::{LocationEncoding, LocationStrategy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use trialscope_core::{
    names, params, FilterSpecTable, FilterValue, RegistryPage, RequestKind, SearchConfig,
    SearchQuery, SearchStrategyResult, Upstream, UpstreamError, UpstreamRequest, UpstreamResult,
};
use trialscope_registry::RegistryClient;

/// Field requested by count probes.
pub const PROBE_FIELDS: &str = "NCTId";

/// Upstream parameters for `query` with the location encoded per `strategy`.
///
/// Parameters follow table order, then the combined `query.term`,
/// `aggFilters` and `filter.advanced` values.
pub fn upstream_params(query: &SearchQuery, strategy: &LocationStrategy) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    let mut terms: Vec<String> = Vec::new();
    let mut aggs: Vec<String> = Vec::new();
    let mut advanced: Vec<String> = Vec::new();

    for spec in FilterSpecTable::all() {
        if spec.name == names::LOCATION {
            continue;
        }
        let Some(value) = query.get(spec.name) else {
            continue;
        };

        match (spec.upstream, value) {
            (Upstream::Param(param), FilterValue::Text(text)) if param == params::QUERY_TERM => {
                terms.push(text.clone());
            }
            (Upstream::Param(param), FilterValue::Text(text) | FilterValue::Enum(text)) => {
                out.push((param.to_string(), text.clone()));
            }
            (Upstream::Param(param), FilterValue::MultiEnum(values)) => {
                let tokens = spec.tokens_for(values.iter().map(String::as_str));
                if !tokens.is_empty() {
                    out.push((param.to_string(), tokens.join(",")));
                }
            }
            (Upstream::AggFilter(key), FilterValue::Enum(value)) => {
                let tokens = spec.tokens_for([value.as_str()]);
                if !tokens.is_empty() {
                    aggs.push(format!("{}:{}", key, tokens.join(" ")));
                }
            }
            (Upstream::AggFilter(key), FilterValue::MultiEnum(values)) => {
                let tokens = spec.tokens_for(values.iter().map(String::as_str));
                if !tokens.is_empty() {
                    aggs.push(format!("{}:{}", key, tokens.join(" ")));
                }
            }
            (Upstream::AdvancedRange(area), FilterValue::DateRange(range)) => {
                advanced.push(range.to_advanced_clause(area));
            }
            (upstream, value) => {
                warn!(filter = spec.name, ?upstream, ?value, "filter value does not fit its mapping");
            }
        }
    }

    match &strategy.encoding {
        LocationEncoding::None => {}
        LocationEncoding::Filter(term) => {
            out.push((params::QUERY_LOCATION.to_string(), term.clone()));
        }
        LocationEncoding::Term(term) => terms.push(term.clone()),
    }

    if !terms.is_empty() {
        out.push((params::QUERY_TERM.to_string(), terms.join(" ")));
    }
    if !aggs.is_empty() {
        out.push((params::AGG_FILTERS.to_string(), aggs.join(",")));
    }
    if !advanced.is_empty() {
        out.push((params::ADVANCED.to_string(), advanced.join(" AND ")));
    }
    out
}

/// Issues single upstream requests with bounded timeouts.
#[derive(Clone)]
pub struct QueryExecutor {
    client: Arc<dyn RegistryClient>,
    data_timeout: Duration,
    probe_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(client: Arc<dyn RegistryClient>, config: &SearchConfig) -> Self {
        Self {
            client,
            data_timeout: config.data_timeout,
            probe_timeout: config.probe_timeout,
        }
    }

    pub fn data_timeout(&self) -> Duration {
        self.data_timeout
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Build the request without sending it.
    pub fn request_for(
        &self,
        query: &SearchQuery,
        strategy: &LocationStrategy,
        kind: RequestKind,
        page_size: u32,
    ) -> UpstreamRequest {
        let timeout = match kind {
            RequestKind::DataPage => self.data_timeout,
            RequestKind::CountProbe => self.probe_timeout,
        };
        let mut request = UpstreamRequest::new(kind, timeout);
        for (name, value) in upstream_params(query, strategy) {
            request.push(name, value);
        }
        request.push(params::PAGE_SIZE, page_size.to_string());
        request.push(params::COUNT_TOTAL, "true");
        request.push(params::FORMAT, "json");
        if kind == RequestKind::CountProbe {
            request.push(params::FIELDS, PROBE_FIELDS);
        }
        request
    }

    /// Fetch one data page (20s budget by default).
    pub async fn execute(
        &self,
        query: &SearchQuery,
        strategy: &LocationStrategy,
        page_size: u32,
    ) -> UpstreamResult<SearchStrategyResult> {
        let request = self.request_for(query, strategy, RequestKind::DataPage, page_size);
        let page = self.send(&request).await?;
        Ok(into_result(page, strategy))
    }

    /// Identifier-only page used for count sampling (10s budget by default).
    pub async fn probe(
        &self,
        query: &SearchQuery,
        strategy: &LocationStrategy,
        page_size: u32,
    ) -> UpstreamResult<SearchStrategyResult> {
        let request = self.request_for(query, strategy, RequestKind::CountProbe, page_size);
        let page = self.send(&request).await?;
        Ok(into_result(page, strategy))
    }

    async fn send(&self, request: &UpstreamRequest) -> UpstreamResult<RegistryPage> {
        let result = match tokio::time::timeout(request.timeout, self.client.search(request)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout {
                budget: request.timeout,
            }),
        };

        if let Err(err) = &result {
            if err.is_rejection() {
                error!(query = %request.describe(), error = %err, "registry rejected constructed query");
            } else {
                warn!(kind = ?request.kind, error = %err, "registry request failed");
            }
        }
        result
    }
}

fn into_result(page: RegistryPage, strategy: &LocationStrategy) -> SearchStrategyResult {
    SearchStrategyResult {
        records: page.records,
        raw_count: page.total_count,
        next_page_token: page.next_page_token,
        strategy: strategy.name,
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("data_timeout", &self.data_timeout)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationCleaner;
    use trialscope_core::{RawValue, StrategyName};
    use trialscope_test_utils::fixtures::{raw, test_config};
    use trialscope_test_utils::{any_request, Reply, ScriptedRegistry};

    fn query(pairs: &[(&str, &str)]) -> SearchQuery {
        crate::ParameterNormalizer::default()
            .normalize(&raw(pairs))
            .query
    }

    fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_text_filters_pass_through() {
        let q = query(&[("condition", "lung cancer"), ("intervention", "CT"), ("sponsor", "NCI")]);
        let params = upstream_params(&q, &LocationStrategy::primary(&q));
        assert_eq!(param(&params, "query.cond"), Some("lung cancer"));
        assert_eq!(param(&params, "query.intr"), Some("CT"));
        assert_eq!(param(&params, "query.spons"), Some("NCI"));
        assert!(param(&params, "query.locn").is_none());
    }

    #[test]
    fn test_agg_filters_are_grouped() {
        let q = query(&[("phase", "PHASE3,PHASE2"), ("sex", "female"), ("age", "ADULT")]);
        let params = upstream_params(&q, &LocationStrategy::primary(&q));
        assert_eq!(param(&params, "aggFilters"), Some("phase:2 3,ages:adult,sex:f"));
    }

    #[test]
    fn test_study_type_and_age_group() {
        let q = query(&[("studyType", "observational, interventional"), ("ageGroup", "OLDER_ADULT")]);
        let params = upstream_params(&q, &LocationStrategy::primary(&q));
        assert_eq!(param(&params, "aggFilters"), Some("ages:older,studyType:int obs"));
    }

    #[test]
    fn test_unconstrained_values_add_no_token() {
        let q = query(&[("sex", "ALL"), ("healthyVolunteers", "N")]);
        let params = upstream_params(&q, &LocationStrategy::primary(&q));
        assert!(param(&params, "aggFilters").is_none());
    }

    #[test]
    fn test_status_and_dates() {
        let mut filters = raw(&[("studyStatus", "completed, recruiting")]);
        filters.insert("studyStart".into(), RawValue::range(Some("2020-01-01"), None));
        filters.insert("completion".into(), RawValue::range(None, Some("2025-01-01")));
        let q = crate::ParameterNormalizer::default().normalize(&filters).query;

        let params = upstream_params(&q, &LocationStrategy::primary(&q));
        assert_eq!(param(&params, "filter.overallStatus"), Some("RECRUITING,COMPLETED"));
        assert_eq!(
            param(&params, "filter.advanced"),
            Some("AREA[StartDate]RANGE[2020-01-01,MAX] AND AREA[CompletionDate]RANGE[MIN,2025-01-01]")
        );
    }

    #[test]
    fn test_location_encodings() {
        let q = query(&[("condition", "lung cancer"), ("location", "Los Angeles, CA"), ("otherTerms", "screening")]);

        let primary = upstream_params(&q, &LocationStrategy::primary(&q));
        assert_eq!(param(&primary, "query.locn"), Some("los angeles"));
        assert_eq!(param(&primary, "query.term"), Some("screening"));

        let cleaned = LocationCleaner::clean(q.location().unwrap());
        let alternatives = LocationStrategy::alternatives(&cleaned);
        assert_eq!(alternatives.len(), 2);

        let city = upstream_params(&q, &alternatives[0]);
        assert!(param(&city, "query.locn").is_none());
        assert_eq!(param(&city, "query.term"), Some("screening los angeles"));
        assert_eq!(param(&city, "query.cond"), Some("lung cancer"));

        let region = upstream_params(&q, &alternatives[1]);
        assert_eq!(param(&region, "query.term"), Some("screening los angeles california"));
    }

    #[test]
    fn test_request_kinds() {
        let registry = Arc::new(ScriptedRegistry::new());
        let executor = QueryExecutor::new(registry, &test_config());
        let q = query(&[("condition", "asthma")]);
        let strategy = LocationStrategy::primary(&q);

        let data = executor.request_for(&q, &strategy, RequestKind::DataPage, 100);
        assert_eq!(data.param("pageSize"), Some("100"));
        assert_eq!(data.param("countTotal"), Some("true"));
        assert_eq!(data.param("format"), Some("json"));
        assert!(!data.has_param("fields"));
        assert_eq!(data.timeout, Duration::from_secs(2));

        let probe = executor.request_for(&q, &strategy, RequestKind::CountProbe, 5000);
        assert_eq!(probe.param("fields"), Some("NCTId"));
        assert_eq!(probe.param("pageSize"), Some("5000"));
        assert_eq!(probe.timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_execute_maps_page() {
        let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::page(3).total(42).token()));
        let executor = QueryExecutor::new(registry.clone(), &test_config());
        let q = query(&[("condition", "asthma")]);

        let result = executor.execute(&q, &LocationStrategy::primary(&q), 3).await.unwrap();
        assert_eq!(result.records.len(), 3);
        assert_eq!(result.raw_count, Some(42));
        assert!(result.has_more());
        assert_eq!(result.strategy, StrategyName::Primary);
        assert_eq!(registry.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_times_out() {
        let registry = Arc::new(
            ScriptedRegistry::new().on(any_request(), Reply::page(1).delayed(Duration::from_secs(30))),
        );
        let executor = QueryExecutor::new(registry, &test_config());
        let q = query(&[("condition", "asthma")]);

        let err = executor.execute(&q, &LocationStrategy::primary(&q), 10).await.unwrap_err();
        assert_eq!(err, UpstreamError::Timeout { budget: Duration::from_secs(2) });
    }

    #[tokio::test]
    async fn test_rejection_is_passed_through() {
        let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::rejected()));
        let executor = QueryExecutor::new(registry, &test_config());
        let q = query(&[("condition", "asthma")]);

        let err = executor.probe(&q, &LocationStrategy::primary(&q), 1000).await.unwrap_err();
        assert!(err.is_rejection());
    }
}
