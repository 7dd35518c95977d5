//! Total-count estimation by progressive page sampling

use serde::Serialize;
use std::future::Future;
use tracing::{debug, warn};
use trialscope_core::{SearchConfig, SearchStrategyResult, UpstreamResult};

/// What one sampling probe tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSample {
    pub returned: u64,
    pub has_more: bool,
}

impl From<SearchStrategyResult> for ProbeSample {
    fn from(result: SearchStrategyResult) -> Self {
        Self {
            returned: result.records.len() as u64,
            has_more: result.has_more(),
        }
    }
}

/// Estimated total and whether it is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountEstimate {
    pub total: u64,
    pub accurate: bool,
}

impl CountEstimate {
    pub fn exact(total: u64) -> Self {
        Self {
            total,
            accurate: true,
        }
    }

    pub fn lower_bound(total: u64) -> Self {
        Self {
            total,
            accurate: false,
        }
    }
}

/// Samples ascending page sizes until one comes back short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountEstimator {
    samples: Vec<u32>,
}

impl Default for CountEstimator {
    fn default() -> Self {
        Self::new(vec![1000, 5000, 10000])
    }
}

impl CountEstimator {
    /// Sizes are sorted and de-duplicated; zero is dropped.
    pub fn new(mut samples: Vec<u32>) -> Self {
        samples.retain(|s| *s > 0);
        samples.sort_unstable();
        samples.dedup();
        Self { samples }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.count_samples.clone())
    }

    pub fn samples(&self) -> &[u32] {
        &self.samples
    }

    /// Total readable straight off a page, without sampling.
    ///
    /// A reliable upstream total is used as is. An unreliable one on a page
    /// with no continuation means the page held everything.
    pub fn direct(result: &SearchStrategyResult) -> Option<CountEstimate> {
        if result.total_is_reliable() {
            return result.raw_count.map(CountEstimate::exact);
        }
        if !result.has_more() {
            return Some(CountEstimate::exact(result.records.len() as u64));
        }
        None
    }

    /// Probe each sample size in turn.
    ///
    /// A probe that fills its page and has a continuation means the total is
    /// larger still. Anything else gives the exact total. When every size
    /// fills, the last size is returned as a lower bound. A failed probe stops
    /// sampling with the best lower bound seen, starting from `floor`.
    pub async fn estimate<F, Fut, P>(&self, floor: u64, mut probe: F) -> CountEstimate
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = UpstreamResult<P>>,
        P: Into<ProbeSample>,
    {
        let mut best = floor;
        for &size in &self.samples {
            let sample = match probe(size).await {
                Ok(sample) => sample.into(),
                Err(err) => {
                    warn!(page_size = size, lower_bound = best, error = %err, "count probe failed");
                    return CountEstimate::lower_bound(best);
                }
            };
            debug!(page_size = size, returned = sample.returned, has_more = sample.has_more, "count probe");

            if sample.returned == u64::from(size) && sample.has_more {
                best = best.max(sample.returned);
                continue;
            }
            if sample.has_more {
                // Upstream capped the page below the requested size.
                warn!(
                    page_size = size,
                    returned = sample.returned,
                    "short probe page still has a continuation, counting it as exact"
                );
            }
            return CountEstimate::exact(sample.returned);
        }
        CountEstimate::lower_bound(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use trialscope_core::{StrategyName, TrialRecord, UpstreamError};

    /// Probe answering as a registry holding `total` matches would.
    fn registry_of(total: u64) -> impl FnMut(u32) -> std::future::Ready<UpstreamResult<ProbeSample>> {
        move |size| {
            let size = u64::from(size);
            std::future::ready(Ok(ProbeSample {
                returned: total.min(size),
                has_more: total > size,
            }))
        }
    }

    fn page(records: usize, raw_count: Option<u64>, token: bool) -> SearchStrategyResult {
        SearchStrategyResult {
            records: (0..records).map(|i| TrialRecord::new(format!("NCT{:08}", i), "t")).collect(),
            raw_count,
            next_page_token: token.then(|| "next".to_string()),
            strategy: StrategyName::Primary,
        }
    }

    #[test]
    fn test_direct_uses_reliable_total() {
        assert_eq!(CountEstimator::direct(&page(100, Some(806), true)), Some(CountEstimate::exact(806)));
        assert_eq!(CountEstimator::direct(&page(0, Some(0), false)), Some(CountEstimate::exact(0)));
    }

    #[test]
    fn test_direct_counts_last_page() {
        assert_eq!(CountEstimator::direct(&page(7, None, false)), Some(CountEstimate::exact(7)));
        assert_eq!(CountEstimator::direct(&page(7, Some(0), false)), Some(CountEstimate::exact(7)));
    }

    #[test]
    fn test_direct_needs_sampling() {
        assert_eq!(CountEstimator::direct(&page(100, None, true)), None);
        assert_eq!(CountEstimator::direct(&page(100, Some(0), true)), None);
    }

    #[test]
    fn test_samples_are_normalized() {
        let estimator = CountEstimator::new(vec![5000, 0, 1000, 5000]);
        assert_eq!(estimator.samples(), &[1000, 5000]);
    }

    #[tokio::test]
    async fn test_stops_at_first_short_page() {
        let estimate = CountEstimator::default().estimate(100, registry_of(4312)).await;
        assert_eq!(estimate, CountEstimate::exact(4312));
    }

    #[tokio::test]
    async fn test_exhausted_samples_give_lower_bound() {
        let estimate = CountEstimator::default().estimate(100, registry_of(250_000)).await;
        assert_eq!(estimate, CountEstimate::lower_bound(10_000));
    }

    #[tokio::test]
    async fn test_full_page_without_token_is_exact() {
        let estimate = CountEstimator::default()
            .estimate(100, |_| async {
                Ok::<_, UpstreamError>(ProbeSample {
                    returned: 1000,
                    has_more: false,
                })
            })
            .await;
        assert_eq!(estimate, CountEstimate::exact(1000));
    }

    #[tokio::test]
    async fn test_capped_page_with_token_counts_as_exact() {
        // Upstream serving at most 1000 records per page.
        let estimate = CountEstimator::default()
            .estimate(100, |size| async move {
                Ok::<_, UpstreamError>(ProbeSample {
                    returned: u64::from(size).min(1000),
                    has_more: true,
                })
            })
            .await;
        assert_eq!(estimate, CountEstimate::exact(1000));
    }

    #[tokio::test]
    async fn test_failed_probe_keeps_best_bound() {
        let calls = RefCell::new(0u32);
        let estimate = CountEstimator::default()
            .estimate(100, |size| {
                *calls.borrow_mut() += 1;
                async move {
                    if size >= 5000 {
                        Err(UpstreamError::Timeout {
                            budget: std::time::Duration::from_secs(10),
                        })
                    } else {
                        Ok(ProbeSample {
                            returned: u64::from(size),
                            has_more: true,
                        })
                    }
                }
            })
            .await;
        assert_eq!(estimate, CountEstimate::lower_bound(1000));
        assert_eq!(*calls.borrow(), 2);
    }

    #[tokio::test]
    async fn test_accepts_strategy_results() {
        let estimate = CountEstimator::new(vec![10])
            .estimate(0, |_| async { Ok::<_, UpstreamError>(page(3, None, true)) })
            .await;
        assert_eq!(estimate, CountEstimate::exact(3));
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;
        use trialscope_test_utils::generators::arb_upstream_total;

        proptest! {
            #[test]
            fn prop_estimate_is_exact_unless_every_page_filled(total in arb_upstream_total()) {
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let estimator = CountEstimator::default();
                let estimate = runtime.block_on(estimator.estimate(0, registry_of(total)));

                let largest = u64::from(*estimator.samples().last().unwrap());
                if total > largest {
                    prop_assert_eq!(estimate, CountEstimate::lower_bound(largest));
                } else {
                    prop_assert_eq!(estimate, CountEstimate::exact(total));
                }
            }
        }
    }
}
