//! Search configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str = "https://clinicaltrials.gov/api/v2/studies";
pub const DEFAULT_USER_AGENT: &str = concat!("trialscope/", env!("CARGO_PKG_VERSION"));

/// Tunables for the search pipeline and its upstream client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub registry_url: String,
    pub user_agent: String,
    /// Budget for data-page requests.
    pub data_timeout: Duration,
    /// Budget for count-only probes.
    pub probe_timeout: Duration,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Below this primary count a location search tries alternatives.
    pub location_floor: u64,
    /// Totals at or below this are returned with full records.
    pub detail_threshold: u64,
    /// Ascending page sizes for total-count sampling.
    pub count_samples: Vec<u32>,
    pub cache_ttl: Duration,
    /// Unknown filters fail the request instead of being dropped.
    pub strict_filters: bool,
    pub requests_per_minute: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            data_timeout: Duration::from_secs(20),
            probe_timeout: Duration::from_secs(10),
            default_page_size: 100,
            max_page_size: 1000,
            location_floor: 100,
            detail_threshold: 10,
            count_samples: vec![1000, 5000, 10000],
            cache_ttl: Duration::from_secs(300),
            strict_filters: false,
            requests_per_minute: 120,
        }
    }
}

impl SearchConfig {
    /// Load from `TRIALSCOPE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let registry_url = std::env::var("TRIALSCOPE_REGISTRY_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.registry_url);

        let user_agent = std::env::var("TRIALSCOPE_USER_AGENT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.user_agent);

        let data_timeout = std::env::var("TRIALSCOPE_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.data_timeout);

        let probe_timeout = std::env::var("TRIALSCOPE_PROBE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.probe_timeout);

        let default_page_size = std::env::var("TRIALSCOPE_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.default_page_size);

        let max_page_size = std::env::var("TRIALSCOPE_MAX_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_page_size);

        let location_floor = std::env::var("TRIALSCOPE_LOCATION_FLOOR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.location_floor);

        let detail_threshold = std::env::var("TRIALSCOPE_DETAIL_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.detail_threshold);

        let count_samples = std::env::var("TRIALSCOPE_COUNT_SAMPLES")
            .ok()
            .and_then(|s| {
                s.split(',')
                    .map(|n| n.trim().parse::<u32>())
                    .collect::<Result<Vec<_>, _>>()
                    .ok()
            })
            .filter(|samples| !samples.is_empty())
            .unwrap_or(defaults.count_samples);

        let cache_ttl = std::env::var("TRIALSCOPE_CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let strict_filters = std::env::var("TRIALSCOPE_STRICT_FILTERS")
            .ok()
            .map(|s| s.to_lowercase() == "true")
            .unwrap_or(defaults.strict_filters);

        let requests_per_minute = std::env::var("TRIALSCOPE_REQUESTS_PER_MINUTE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.requests_per_minute);

        Self {
            registry_url,
            user_agent,
            data_timeout,
            probe_timeout,
            default_page_size,
            max_page_size,
            location_floor,
            detail_threshold,
            count_samples,
            cache_ttl,
            strict_filters,
            requests_per_minute,
        }
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "registry_url".to_string(),
            });
        }

        for (field, value) in [
            ("data_timeout", self.data_timeout),
            ("probe_timeout", self.probe_timeout),
            ("cache_ttl", self.cache_ttl),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: format!("{:?}", value),
                    reason: format!("{} must be positive", field),
                });
            }
        }

        if self.max_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_page_size".to_string(),
                value: self.max_page_size.to_string(),
                reason: "max_page_size must be greater than 0".to_string(),
            });
        }

        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue {
                field: "default_page_size".to_string(),
                value: self.default_page_size.to_string(),
                reason: format!("default_page_size must be between 1 and {}", self.max_page_size),
            });
        }

        if self.count_samples.is_empty()
            || self.count_samples.contains(&0)
            || self.count_samples.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(ConfigError::InvalidValue {
                field: "count_samples".to_string(),
                value: format!("{:?}", self.count_samples),
                reason: "count_samples must be a non-empty strictly ascending sequence".to_string(),
            });
        }

        if self.requests_per_minute == 0 {
            return Err(ConfigError::InvalidValue {
                field: "requests_per_minute".to_string(),
                value: self.requests_per_minute.to_string(),
                reason: "requests_per_minute must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Minimum spacing between upstream requests.
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(60_000 / u64::from(self.requests_per_minute.max(1)))
    }
}
