//! TrialScope Core - Data Types
//!
//! Filter table, canonical queries, trial records, outcomes and the error
//! taxonomy. No I/O lives here; every other crate depends on this one.

pub mod config;
pub mod error;
pub mod filter;
pub mod query;
pub mod region;
pub mod trial;
pub mod upstream;

pub use config::{SearchConfig, DEFAULT_REGISTRY_URL, DEFAULT_USER_AGENT};
pub use error::{
    ConfigError, TrialScopeError, TrialScopeResult, UpstreamError, UpstreamResult,
    ValidationError,
};
pub use filter::{
    names, params, AllowedValue, FilterDescription, FilterGroup, FilterSpec, FilterSpecTable,
    TextRule, Upstream, ValueKind,
};
pub use query::{
    collapse_whitespace, CacheKey, DateRange, FilterValue, RawFilters, RawValue, SearchQuery,
    DATE_FORMAT,
};
pub use region::Region;
pub use trial::{
    parse_trial_id, EnrichedTrial, ResultKind, SearchOutcome, SearchResponse,
    SearchStrategyResult, StrategyName, SummaryInput, TrialDetail, TrialRecord, STUDY_PAGE_BASE,
};
pub use upstream::{RegistryPage, RequestKind, UpstreamRequest};
