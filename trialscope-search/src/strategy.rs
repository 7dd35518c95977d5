//! Location strategies
//!
//! The registry often under-counts "condition + full location" queries. When
//! a location search comes back below the yield floor, the same query is
//! re-run with the location encoded differently and the best yield wins.

use crate::executor::QueryExecutor;
use crate::location::{CleanedLocation, LocationCleaner};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use trialscope_core::{SearchConfig, SearchQuery, SearchStrategyResult, StrategyName, UpstreamResult};

// ============================================================================
// STRATEGY DESCRIPTORS
// ============================================================================

/// Where the location term goes in the upstream request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "term", rename_all = "snake_case")]
pub enum LocationEncoding {
    /// The query has no location.
    None,
    /// Sent as the location parameter.
    Filter(String),
    /// Appended to the free-text term.
    Term(String),
}

/// One way of encoding the location filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationStrategy {
    pub name: StrategyName,
    pub encoding: LocationEncoding,
}

impl LocationStrategy {
    /// The query as normalized: cleaned city in the location parameter.
    pub fn primary(query: &SearchQuery) -> Self {
        let encoding = match query.location().map(LocationCleaner::clean) {
            Some(cleaned) if !cleaned.primary_term().is_empty() => {
                LocationEncoding::Filter(cleaned.primary_term())
            }
            _ => LocationEncoding::None,
        };
        Self {
            name: StrategyName::Primary,
            encoding,
        }
    }

    /// Alternatives in trial order: city-only, then city plus full region name.
    pub fn alternatives(cleaned: &CleanedLocation) -> Vec<Self> {
        if !cleaned.has_city() {
            return Vec::new();
        }
        let mut out = vec![Self {
            name: StrategyName::CityOnly,
            encoding: LocationEncoding::Term(cleaned.city.clone()),
        }];
        if let Some(expanded) = cleaned.expanded_term() {
            out.push(Self {
                name: StrategyName::RegionExpanded,
                encoding: LocationEncoding::Term(expanded),
            });
        }
        out
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// A strategy together with the page it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub strategy: LocationStrategy,
    pub result: SearchStrategyResult,
}

impl Candidate {
    pub fn yield_count(&self) -> u64 {
        self.result.yield_count()
    }
}

/// Highest yield wins; ties keep the earlier candidate, so the primary.
pub fn select_best(primary: Candidate, alternatives: impl IntoIterator<Item = Candidate>) -> Candidate {
    alternatives.into_iter().fold(primary, |best, candidate| {
        if candidate.yield_count() > best.yield_count() {
            candidate
        } else {
            best
        }
    })
}

/// Yield of one attempted strategy. Failed branches count as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAttempt {
    pub strategy: StrategyName,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of running the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub chosen: Candidate,
    pub primary_count: u64,
    /// Alternatives that were run, in order. Empty when none were needed.
    pub attempts: Vec<StrategyAttempt>,
}

impl Selection {
    pub fn strategy_used(&self) -> StrategyName {
        self.chosen.strategy.name
    }

    /// Explanation for the outcome note; `None` when no alternative ran.
    pub fn note(&self) -> Option<String> {
        if self.attempts.is_empty() {
            return None;
        }
        let name = self.strategy_used();
        if name == StrategyName::Primary {
            Some(format!(
                "Kept primary location strategy ({} studies found; no alternative found more).",
                self.primary_count
            ))
        } else {
            Some(format!(
                "Used {} location strategy ({} studies found; primary found {}).",
                name,
                self.chosen.yield_count(),
                self.primary_count
            ))
        }
    }
}

/// Runs the primary query and, when its yield is low, the alternatives.
#[derive(Debug, Clone, Copy)]
pub struct LocationStrategySelector {
    floor: u64,
}

impl Default for LocationStrategySelector {
    fn default() -> Self {
        Self { floor: 100 }
    }
}

impl LocationStrategySelector {
    pub fn new(floor: u64) -> Self {
        Self { floor }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.location_floor)
    }

    pub fn floor(&self) -> u64 {
        self.floor
    }

    /// Alternatives worth trying for this primary result, if any.
    pub fn plan(&self, query: &SearchQuery, primary: &SearchStrategyResult) -> Vec<LocationStrategy> {
        match query.location() {
            Some(location) if primary.yield_count() < self.floor => {
                LocationStrategy::alternatives(&LocationCleaner::clean(location))
            }
            _ => Vec::new(),
        }
    }

    /// Run the primary query, then the planned alternatives concurrently.
    ///
    /// Only a primary failure is an error. A failed or timed-out alternative
    /// is logged and counts as yielding nothing.
    pub async fn run(
        &self,
        executor: &QueryExecutor,
        query: &SearchQuery,
        page_size: u32,
    ) -> UpstreamResult<Selection> {
        let primary_strategy = LocationStrategy::primary(query);
        let primary_result = executor.execute(query, &primary_strategy, page_size).await?;
        let primary_count = primary_result.yield_count();

        let plan = self.plan(query, &primary_result);
        let primary = Candidate {
            strategy: primary_strategy,
            result: primary_result,
        };
        if plan.is_empty() {
            return Ok(Selection {
                chosen: primary,
                primary_count,
                attempts: Vec::new(),
            });
        }

        debug!(
            primary_count,
            floor = self.floor,
            alternatives = plan.len(),
            "primary location yield below floor, trying alternatives"
        );

        let results = join_all(
            plan.iter()
                .map(|strategy| executor.execute(query, strategy, page_size)),
        )
        .await;

        let mut attempts = Vec::with_capacity(plan.len());
        let mut candidates = Vec::with_capacity(plan.len());
        for (strategy, result) in plan.into_iter().zip(results) {
            match result {
                Ok(result) => {
                    attempts.push(StrategyAttempt {
                        strategy: strategy.name,
                        count: result.yield_count(),
                        error: None,
                    });
                    candidates.push(Candidate { strategy, result });
                }
                Err(err) => {
                    warn!(strategy = %strategy.name, error = %err, "location strategy failed, counting as empty");
                    attempts.push(StrategyAttempt {
                        strategy: strategy.name,
                        count: 0,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let chosen = select_best(primary, candidates);
        if chosen.strategy.name != StrategyName::Primary {
            info!(
                strategy = %chosen.strategy.name,
                count = chosen.yield_count(),
                primary_count,
                "switched location strategy"
            );
        }

        Ok(Selection {
            chosen,
            primary_count,
            attempts,
        })
    }
}
