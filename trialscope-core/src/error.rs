//! Error types for TrialScope operations

use std::time::Duration;
use thiserror::Error;

/// Filter and identifier validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown filter: {name}")]
    UnknownFilter { name: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid page size {value}: must be between 1 and {max}")]
    InvalidPageSize { value: String, max: u32 },

    #[error("Invalid trial identifier: {value}")]
    InvalidTrialId { value: String },
}

/// Errors raised while talking to the upstream registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Registry unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Registry request timed out after {budget:?}")]
    Timeout { budget: Duration },

    #[error("Registry rejected query ({status}) {query}: {message}")]
    Rejected {
        status: u16,
        message: String,
        query: String,
    },

    #[error("Invalid response from registry: {reason}")]
    InvalidResponse { reason: String },
}

impl UpstreamError {
    /// Rejections point at a malformed query; everything else is transient.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all TrialScope errors.
#[derive(Debug, Clone, Error)]
pub enum TrialScopeError {
    #[error("Invalid filter: {}", join_errors(.errors))]
    InvalidFilter { errors: Vec<ValidationError> },

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Trial not found: {trial_id}")]
    NotFound { trial_id: String },

    #[error("Search service unavailable: {source}")]
    ServiceUnavailable { source: UpstreamError },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Summarization failed: {reason}")]
    Summarization { reason: String },
}

impl From<ValidationError> for TrialScopeError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidFilter { errors: vec![err] }
    }
}

impl TrialScopeError {
    /// Wrap an upstream failure that could not be served from cache.
    pub fn service_unavailable(source: UpstreamError) -> Self {
        Self::ServiceUnavailable { source }
    }

    pub fn is_invalid_filter(&self) -> bool {
        matches!(self, Self::InvalidFilter { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for TrialScope operations.
pub type TrialScopeResult<T> = Result<T, TrialScopeError>;

/// Result type alias for a single upstream call.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

// =============================================================================
// TESTS
// =============================================================================
