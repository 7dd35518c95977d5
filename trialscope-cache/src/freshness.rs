//! Freshness metadata for cache reads.
//!
//! Every read says where its value came from, so callers can tell a fresh
//! resolution from a memoized hit or from a stale fallback served because
//! the upstream failed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Where a cached value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSource {
    /// Fresh entry found on lookup.
    Cached,
    /// Fresh entry written by a concurrent resolution this caller waited on.
    Coalesced,
    /// Resolved by this caller.
    Resolved,
    /// Expired entry served because resolution failed.
    Stale,
}

/// Result of a cache read, carrying staleness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    cached_at: DateTime<Utc>,
    age: Duration,
    source: ReadSource,
    fallback_reason: Option<String>,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T, cached_at: DateTime<Utc>, now: DateTime<Utc>, source: ReadSource) -> Self {
        Self {
            value,
            cached_at,
            age: age_between(cached_at, now),
            source,
            fallback_reason: None,
        }
    }

    pub fn resolved(value: T, now: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at: now,
            age: Duration::ZERO,
            source: ReadSource::Resolved,
            fallback_reason: None,
        }
    }

    /// Expired value served in place of a failed resolution.
    pub fn stale(value: T, cached_at: DateTime<Utc>, now: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            value,
            cached_at,
            age: age_between(cached_at, now),
            source: ReadSource::Stale,
            fallback_reason: Some(reason.into()),
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    /// Age of the value at read time.
    pub fn staleness(&self) -> Duration {
        self.age
    }

    pub fn is_stale(&self) -> bool {
        self.source == ReadSource::Stale
    }

    /// True unless this caller resolved the value itself.
    pub fn was_cache_hit(&self) -> bool {
        self.source != ReadSource::Resolved
    }

    /// Error message of the failed resolution behind a stale read.
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            cached_at: self.cached_at,
            age: self.age,
            source: self.source,
            fallback_reason: self.fallback_reason,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

fn age_between(then: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - then).to_std().unwrap_or(Duration::ZERO)
}
