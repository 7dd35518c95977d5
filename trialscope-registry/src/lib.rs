//! TrialScope Registry - upstream access
//!
//! Traits for the two external collaborators of the search layer: the trial
//! registry itself and the plain-language summary generator. Concrete
//! providers live under [`providers`].

pub mod providers;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use trialscope_core::{
    RegistryPage, SummaryInput, TrialRecord, TrialScopeResult, UpstreamError, UpstreamRequest,
    UpstreamResult,
};

pub use providers::{
    ClinicalTrialsClient, OpenAIClient, OpenAITrialSummarizer, TemplateSummarizer,
};

/// Shown in place of a summary the generator could not produce.
pub const SUMMARY_FALLBACK: &str = "Plain-language summary not available at this time.";

// ============================================================================
// REGISTRY CLIENT TRAIT
// ============================================================================

/// Access to the trial registry's search and study endpoints.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// let page = client.search(&request).await?;
/// println!("{} records, total {:?}", page.records.len(), page.total_count);
/// ```
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Run one search request and return a single page.
    ///
    /// The request carries its own timeout budget; implementations must not
    /// block longer than that.
    async fn search(&self, request: &UpstreamRequest) -> UpstreamResult<RegistryPage>;

    /// Fetch one study by identifier. `Ok(None)` when the registry has no such study.
    async fn study(&self, trial_id: &str, timeout: Duration) -> UpstreamResult<Option<TrialRecord>>;
}

// ============================================================================
// SUMMARIZER TRAIT
// ============================================================================

/// Generates a plain-language description of one trial.
#[async_trait]
pub trait TrialSummarizer: Send + Sync {
    async fn summarize(&self, input: &SummaryInput) -> TrialScopeResult<String>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}

// ============================================================================
// REQUEST ACCOUNTING
// ============================================================================

/// Counts upstream requests by outcome.
/// Thread-safe via atomic operations.
#[derive(Default)]
pub struct RequestTracker {
    requests: AtomicU64,
    successes: AtomicU64,
    timeouts: AtomicU64,
    rejections: AtomicU64,
    failures: AtomicU64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    /// Classify a failed request.
    pub fn record_error(&self, err: &UpstreamError) {
        let counter = match err {
            UpstreamError::Timeout { .. } => &self.timeouts,
            UpstreamError::Rejected { .. } => &self.rejections,
            UpstreamError::Unavailable { .. } | UpstreamError::InvalidResponse { .. } => {
                &self.failures
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RequestStats {
        RequestStats {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.requests,
            &self.successes,
            &self.timeouts,
            &self.rejections,
            &self.failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.snapshot();
        f.debug_struct("RequestTracker")
            .field("requests", &stats.requests)
            .field("successes", &stats.successes)
            .field("timeouts", &stats.timeouts)
            .field("rejections", &stats.rejections)
            .field("failures", &stats.failures)
            .finish()
    }
}

/// Point-in-time copy of the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestStats {
    pub requests: u64,
    pub successes: u64,
    pub timeouts: u64,
    pub rejections: u64,
    pub failures: u64,
}
