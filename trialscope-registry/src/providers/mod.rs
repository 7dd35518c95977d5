//! Provider implementations
//!
//! This module contains the HTTP registry client and the summarizers that
//! implement the traits in the crate root.

pub mod clinicaltrials;
pub mod openai;
mod pacer;
pub mod template;

pub use clinicaltrials::ClinicalTrialsClient;
pub use openai::{OpenAIClient, OpenAITrialSummarizer};
pub use template::TemplateSummarizer;

pub(crate) use pacer::RequestPacer;

use trialscope_core::{TrialScopeError, UpstreamError};

pub(crate) fn unavailable(reason: impl Into<String>) -> UpstreamError {
    UpstreamError::Unavailable {
        reason: reason.into(),
    }
}

pub(crate) fn invalid_response(reason: impl Into<String>) -> UpstreamError {
    UpstreamError::InvalidResponse {
        reason: reason.into(),
    }
}

pub(crate) fn summarization_failed(provider: &str, reason: impl std::fmt::Display) -> TrialScopeError {
    TrialScopeError::Summarization {
        reason: format!("{}: {}", provider, reason),
    }
}

/// Cut an error body down to something loggable.
pub(crate) fn truncate_body(body: &str, max: usize) -> String {
    let body = body.trim();
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
