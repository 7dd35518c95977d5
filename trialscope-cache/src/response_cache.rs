//! TTL response cache with single-flight resolution and stale fallback.
//!
//! Entries are fresh while `now - created_at < ttl`. Expired entries are not
//! deleted: they stay around so that a failed refetch can still be answered
//! with the old payload, flagged as stale. Nothing sweeps the map; an entry
//! is only ever replaced by a newer resolution of the same key.
//!
//! At most one resolution per key runs at a time. Callers that arrive while a
//! resolution is in flight wait for it and then read its result.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::clock::{Clock, SystemClock};
use crate::freshness::{CacheRead, ReadSource};
use crate::stats::{CacheCounters, CacheStats};

/// Configuration for a response cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry is served without refetching.
    pub ttl: Duration,
    /// Label used in log lines.
    pub name: &'static str,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            name: "responses",
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

/// A stored payload and when it was resolved.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

type FlightLock = Arc<Mutex<()>>;

/// Holds the per-key resolution lock; drops the lock entry once unused.
struct Flight<'a> {
    flights: &'a DashMap<String, FlightLock>,
    key: &'a str,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.flights
            .remove_if(self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Shared in-memory cache keyed by canonical request strings.
pub struct ResponseCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    flights: DashMap<String, FlightLock>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    counters: CacheCounters,
}

impl<T> ResponseCache<T>
where
    T: Clone + Send + Sync,
{
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            flights: DashMap::new(),
            clock,
            config,
            counters: CacheCounters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the fresh entry for `key`, or run `resolve` to produce one.
    ///
    /// If `resolve` fails and an expired entry exists, that entry is returned
    /// as a stale read instead of the error.
    pub async fn get_or_resolve<F, Fut, E>(&self, key: &str, resolve: F) -> Result<CacheRead<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        if let Some(read) = self.lookup_fresh(key, ReadSource::Cached) {
            self.counters.hit();
            tracing::debug!(cache = self.config.name, key = %key, "cache hit");
            return Ok(read);
        }

        let _flight = self.join_flight(key).await;

        if let Some(read) = self.lookup_fresh(key, ReadSource::Coalesced) {
            self.counters.coalesced();
            tracing::debug!(cache = self.config.name, key = %key, "joined in-flight resolution");
            return Ok(read);
        }

        self.counters.miss();
        match resolve().await {
            Ok(value) => {
                let now = self.clock.now();
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value: value.clone(),
                        created_at: now,
                    },
                );
                Ok(CacheRead::resolved(value, now))
            }
            Err(err) => {
                let retained = self
                    .entries
                    .get(key)
                    .map(|entry| (entry.value.clone(), entry.created_at));
                match retained {
                    Some((value, created_at)) => {
                        self.counters.stale();
                        let read = CacheRead::stale(value, created_at, self.clock.now(), err.to_string());
                        tracing::warn!(
                            cache = self.config.name,
                            key = %key,
                            age_secs = read.staleness().as_secs(),
                            error = %err,
                            "resolution failed, serving stale entry"
                        );
                        Ok(read)
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Fresh entry for `key`, if any. Does not touch the counters.
    pub fn peek(&self, key: &str) -> Option<CacheRead<T>> {
        self.lookup_fresh(key, ReadSource::Cached)
    }

    /// Store a value directly, replacing any existing entry.
    pub fn insert(&self, key: impl Into<String>, value: T) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                created_at: self.clock.now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Entries held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys with a resolution currently running or awaited.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.len())
    }

    fn lookup_fresh(&self, key: &str, source: ReadSource) -> Option<CacheRead<T>> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        if entry.is_fresh(now, self.config.ttl) {
            Some(CacheRead::from_cache(
                entry.value.clone(),
                entry.created_at,
                now,
                source,
            ))
        } else {
            None
        }
    }

    async fn join_flight<'a>(&'a self, key: &'a str) -> Flight<'a> {
        let lock = self.flights.entry(key.to_string()).or_default().clone();
        let mut flight = Flight {
            flights: &self.flights,
            key,
            guard: None,
        };
        flight.guard = Some(lock.lock_owned().await);
        flight
    }
}

impl<T> fmt::Debug for ResponseCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("name", &self.config.name)
            .field("ttl", &self.config.ttl)
            .field("entries", &self.entries.len())
            .field("in_flight", &self.flights.len())
            .finish()
    }
}
