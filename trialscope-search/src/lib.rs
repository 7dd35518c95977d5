//! TrialScope Search - orchestration layer
//!
//! Pipeline for one search:
//!
//! 1. [`ParameterNormalizer`] validates the caller's filters into a canonical query
//! 2. the [`ResponseCache`](trialscope_cache::ResponseCache) is consulted by canonical key
//! 3. on a miss, [`LocationStrategySelector`] runs the primary query and, for low-yield
//!    location searches, the alternative location encodings
//! 4. [`CountEstimator`] samples page sizes when the upstream total is unreliable
//! 5. [`ResultClassifier`] decides between full records and a count-only answer
//! 6. detailed outcomes are enriched with plain-language summaries
//!
//! [`SearchService`] wires these together.

pub mod classifier;
pub mod enrichment;
pub mod estimator;
pub mod executor;
pub mod location;
pub mod normalizer;
pub mod service;
pub mod strategy;
pub mod telemetry;

pub use classifier::ResultClassifier;
pub use enrichment::Enricher;
pub use estimator::{CountEstimate, CountEstimator, ProbeSample};
pub use executor::{upstream_params, QueryExecutor, PROBE_FIELDS};
pub use location::{CleanedLocation, LocationCleaner, RegionHint};
pub use normalizer::{NormalizeMode, Normalized, ParameterNormalizer, ValidationReport};
pub use service::{SearchService, ServiceStats};
pub use strategy::{
    select_best, Candidate, LocationEncoding, LocationStrategy, LocationStrategySelector,
    Selection, StrategyAttempt,
};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig, TelemetryError};
