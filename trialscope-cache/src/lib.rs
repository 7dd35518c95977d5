//! TrialScope Cache
//!
//! In-memory response cache shared by the search pipeline. Keys are canonical
//! request strings, entries expire after a fixed TTL, and expired entries are
//! kept as a fallback for when the upstream cannot be reached.
//!
//! ```ignore
//! let cache = ResponseCache::new(CacheConfig::new().with_ttl(Duration::from_secs(300)));
//! let read = cache.get_or_resolve(key.as_str(), || pipeline.run(&query)).await?;
//! if read.is_stale() {
//!     tracing::warn!("serving stale payload");
//! }
//! ```

pub mod clock;
pub mod freshness;
pub mod response_cache;
pub mod stats;

pub use clock::{Clock, ManualClock, SystemClock};
pub use freshness::{CacheRead, ReadSource};
pub use response_cache::{CacheConfig, CacheEntry, ResponseCache};
pub use stats::CacheStats;
