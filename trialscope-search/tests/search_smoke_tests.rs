//! End-to-end search scenarios against a scripted registry

use std::sync::Arc;
use std::time::Duration;

use trialscope_cache::ManualClock;
use trialscope_core::{ResultKind, StrategyName, TrialScopeResult};
use trialscope_search::SearchService;
use trialscope_test_utils::assertions::*;
use trialscope_test_utils::fixtures::*;
use trialscope_test_utils::*;

fn service_with(registry: &Arc<ScriptedRegistry>, summarizer: Arc<MockSummarizer>) -> SearchService {
    SearchService::new(test_config(), registry.clone(), summarizer).unwrap()
}

fn service(registry: &Arc<ScriptedRegistry>) -> SearchService {
    service_with(registry, Arc::new(MockSummarizer::new()))
}

#[tokio::test]
async fn smoke_test_low_location_yield_switches_to_city_only() -> TrialScopeResult<()> {
    let registry = Arc::new(
        ScriptedRegistry::new()
            .on(param_eq(params::QUERY_LOCATION, "los angeles"), Reply::page(95).total(95))
            .on(
                param_contains(params::QUERY_TERM, "los angeles california"),
                Reply::page(100).total(640).token(),
            )
            .on(
                param_contains(params::QUERY_TERM, "los angeles"),
                Reply::page(100).total(806).token(),
            ),
    );
    let summarizer = Arc::new(MockSummarizer::new());
    let service = service_with(&registry, summarizer.clone());

    let response = service
        .search(&raw(&[("condition", "lung cancer"), ("location", "los angeles, ca")]))
        .await?;
    let outcome = &response.outcome;

    assert_count_only(outcome, 806);
    assert_eq!(outcome.strategy_used, StrategyName::CityOnly);
    assert!(outcome.accurate_total);
    let note = outcome.note.as_deref().unwrap_or_default();
    assert!(note.contains("Used city-only location strategy (806 studies found; primary found 95)."));
    assert!(note.contains("Large result set (806 trials)"));

    // Primary plus two alternatives; no sampling because 806 is reliable.
    assert_eq!(registry.call_count(), 3);
    assert!(registry.requests_matching(&count_probe()).is_empty());
    assert_eq!(summarizer.call_count(), 0);

    let primary = &registry.requests_matching(&has_param(params::QUERY_LOCATION))[0];
    assert_eq!(primary.param("query.cond"), Some("lung cancer"));
    assert_eq!(primary.param(params::PAGE_SIZE), Some("100"));
    assert_eq!(primary.param(params::COUNT_TOTAL), Some("true"));
    Ok(())
}

#[tokio::test]
async fn smoke_test_single_study_id_is_detailed() -> TrialScopeResult<()> {
    let registry = Arc::new(ScriptedRegistry::new().on(
        param_eq("query.id", "NCT03451162"),
        Reply::records(vec![lung_cancer_screening()]).total(1),
    ));
    let service = service(&registry);

    let response = service.search(&raw(&[("studyIds", "nct03451162")])).await?;
    let outcome = &response.outcome;

    assert_detailed(outcome, 1);
    assert_eq!(outcome.total_count, 1);
    assert!(outcome.accurate_total);
    assert!(outcome.note.is_none());
    assert_eq!(outcome.records[0].trial.nct_id, "NCT03451162");
    assert_eq!(outcome.records[0].plain_summary, "Summary of NCT03451162");
    assert_eq!(
        outcome.records[0].official_url,
        "https://clinicaltrials.gov/study/NCT03451162"
    );
    assert!(!response.from_cache);
    Ok(())
}

#[tokio::test]
async fn smoke_test_missing_total_is_sampled() -> TrialScopeResult<()> {
    let registry = Arc::new(
        ScriptedRegistry::new()
            .on(count_probe().and(page_size(1000)), Reply::page(1000).token())
            .on(count_probe().and(page_size(5000)), Reply::page(4312))
            .on(data_page(), Reply::page(100).total(0).token()),
    );
    let service = service(&registry);

    let response = service.search(&raw(&[("condition", "cancer")])).await?;
    let outcome = &response.outcome;

    assert_count_only(outcome, 4312);
    assert!(outcome.accurate_total);
    assert_eq!(outcome.strategy_used, StrategyName::Primary);

    let probes = registry.requests_matching(&count_probe());
    assert_eq!(probes.len(), 2);
    assert!(probes.iter().all(|p| p.param("query.cond") == Some("cancer")));
    assert!(probes.iter().all(|p| p.timeout == Duration::from_secs(1)));
    Ok(())
}

#[tokio::test]
async fn smoke_test_exhausted_sampling_is_a_lower_bound() -> TrialScopeResult<()> {
    let registry = Arc::new(
        ScriptedRegistry::new()
            .on(count_probe().and(page_size(1000)), Reply::page(1000).token())
            .on(count_probe().and(page_size(5000)), Reply::page(5000).token())
            .on(count_probe().and(page_size(10000)), Reply::page(10000).token())
            .on(data_page(), Reply::page(100).token()),
    );
    let service = service(&registry);

    let outcome = service.search(&raw(&[("condition", "cancer")])).await?.outcome;
    assert_count_only(&outcome, 10000);
    assert!(!outcome.accurate_total);
    assert!(outcome.note.unwrap_or_default().contains("at least 10000"));
    Ok(())
}

#[tokio::test]
async fn smoke_test_boundary_of_ten() -> TrialScopeResult<()> {
    let registry = Arc::new(
        ScriptedRegistry::new()
            .on(param_eq("query.cond", "ten"), Reply::page(10).total(10))
            .on(param_eq("query.cond", "eleven"), Reply::page(11).total(11)),
    );
    let service = service(&registry);

    let ten = service.search(&raw(&[("condition", "ten")])).await?.outcome;
    assert_eq!(ten.kind, ResultKind::Detailed);
    assert_detailed(&ten, 10);

    let eleven = service.search(&raw(&[("condition", "eleven")])).await?.outcome;
    assert_count_only(&eleven, 11);
    Ok(())
}

#[tokio::test]
async fn smoke_test_detailed_result_smaller_than_page_is_complete() -> TrialScopeResult<()> {
    let registry = Arc::new(
        ScriptedRegistry::new()
            .on(page_size(5), Reply::page(5).total(8).token())
            .on(page_size(8), Reply::page(8).total(8)),
    );
    let service = service(&registry);

    let outcome = service
        .search(&raw(&[("condition", "asthma"), ("pageSize", "5")]))
        .await?
        .outcome;

    assert_detailed(&outcome, 8);
    assert_eq!(outcome.total_count, 8);
    assert_eq!(registry.call_count(), 2);
    assert_eq!(registry.requests_matching(&page_size(8)).len(), 1);
    Ok(())
}

#[tokio::test]
async fn smoke_test_summary_failure_uses_fallback() -> TrialScopeResult<()> {
    let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::page(2).total(2)));
    let service = service_with(
        &registry,
        Arc::new(MockSummarizer::new().failing_for(["NCT00000002"])),
    );

    let outcome = service.search(&raw(&[("condition", "asthma")])).await?.outcome;
    assert_detailed(&outcome, 2);
    assert_eq!(outcome.records[1].plain_summary, trialscope_registry::SUMMARY_FALLBACK);
    Ok(())
}

#[tokio::test]
async fn smoke_test_same_query_within_ttl_is_memoized() -> TrialScopeResult<()> {
    let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::page(40).total(400).token()));
    let service = service(&registry);

    let first = service.search(&raw(&[("condition", "Asthma"), ("phase", "PHASE2,PHASE3")])).await?;
    let calls = registry.call_count();
    // Same canonical query: different case, order and spacing.
    let second = service
        .search(&raw(&[("phase", "phase3, phase2"), ("condition", "  asthma ")]))
        .await?;

    assert_eq!(registry.call_count(), calls);
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert!(!second.stale);
    assert_eq!(first.outcome, second.outcome);
    assert_eq!(service.stats().searches.hits, 1);
    Ok(())
}

#[tokio::test]
async fn smoke_test_page_size_is_part_of_the_key() -> TrialScopeResult<()> {
    let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::page(5).total(5)));
    let service = service(&registry);

    service.search(&raw(&[("condition", "asthma")])).await?;
    service.search(&raw(&[("condition", "asthma"), ("pageSize", "5")])).await?;
    assert_eq!(registry.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn smoke_test_stale_result_served_during_outage() -> TrialScopeResult<()> {
    let clock = Arc::new(ManualClock::new());
    let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::page(3).total(3)));
    let service = service(&registry).with_clock(clock.clone());
    let filters = raw(&[("condition", "asthma")]);

    let fresh = service.search(&filters).await?;
    clock.advance(Duration::from_secs(301));
    registry.prepend_rule(any_request(), Reply::unavailable());

    let stale = service.search(&filters).await?;
    assert!(stale.stale);
    assert!(stale.from_cache);
    assert_eq!(stale.outcome, fresh.outcome);
    assert_eq!(service.stats().searches.stale_served, 1);
    Ok(())
}

#[tokio::test]
async fn smoke_test_total_failure_is_service_unavailable() {
    let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::unavailable()));
    let service = service(&registry);

    let result = service.search(&raw(&[("condition", "asthma")])).await;
    assert_service_unavailable(&result);
    let message = result.unwrap_err().to_string();
    assert!(message.contains("scripted outage"), "{}", message);
}

#[tokio::test]
async fn smoke_test_rejection_is_service_unavailable() {
    let registry = Arc::new(ScriptedRegistry::new().on(any_request(), Reply::rejected()));
    let service = service(&registry);

    let result = service.search(&raw(&[("condition", "asthma")])).await;
    match result {
        Err(trialscope_core::TrialScopeError::ServiceUnavailable { source }) => {
            assert!(source.is_rejection());
        }
        other => panic!("Expected ServiceUnavailable, got: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn smoke_test_concurrent_identical_searches_share_one_resolution() -> TrialScopeResult<()> {
    let registry = Arc::new(ScriptedRegistry::new().on(
        any_request(),
        Reply::page(20).total(20).delayed(Duration::from_millis(200)),
    ));
    let service = service(&registry);
    let filters = raw(&[("condition", "asthma"), ("location", "Boston, MA")]);

    let (a, b) = tokio::join!(service.search(&filters), service.search(&filters));
    let (a, b) = (a?, b?);

    // One pipeline run: primary plus both alternatives for the low yield.
    assert_eq!(registry.call_count(), 3);
    assert_eq!(a.outcome, b.outcome);
    assert!(a.from_cache != b.from_cache);
    assert_eq!(service.stats().searches.coalesced, 1);
    Ok(())
}

#[tokio::test]
async fn smoke_test_unknown_filter_strict_mode() {
    let registry = Arc::new(ScriptedRegistry::new());
    let config = trialscope_core::SearchConfig {
        strict_filters: true,
        ..test_config()
    };
    let service = SearchService::new(config, registry.clone(), Arc::new(MockSummarizer::new())).unwrap();

    let result = service.search(&raw(&[("colour", "blue")])).await;
    assert_invalid_filter(&result);
    assert_eq!(registry.call_count(), 0);
}
