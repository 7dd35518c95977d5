//! ClinicalTrials.gov HTTP client with rate limiting

use super::types::{StudiesResponse, Study};
use crate::providers::{invalid_response, truncate_body, unavailable, RequestPacer};
use crate::{RegistryClient, RequestTracker};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::SemaphorePermit;
use trialscope_core::{
    RegistryPage, SearchConfig, TrialRecord, UpstreamError, UpstreamRequest, UpstreamResult,
};

const MAX_ERROR_BODY: usize = 300;

/// Registry client for the public v2 studies endpoint.
pub struct ClinicalTrialsClient {
    client: Client,
    base_url: String,
    pacer: RequestPacer,
    tracker: Arc<RequestTracker>,
}

impl ClinicalTrialsClient {
    /// Build a client from the search configuration.
    pub fn new(config: &SearchConfig) -> UpstreamResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.registry_url.trim_end_matches('/').to_string(),
            pacer: RequestPacer::new(
                config.requests_per_minute as usize,
                config.min_request_interval(),
            ),
            tracker: Arc::new(RequestTracker::new()),
        })
    }

    /// Share an existing tracker instead of the client's own.
    pub fn with_tracker(mut self, tracker: Arc<RequestTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn tracker(&self) -> Arc<RequestTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn throttle(&self) -> UpstreamResult<SemaphorePermit<'_>> {
        self.pacer
            .acquire()
            .await
            .map_err(|e| unavailable(format!("Rate limiter error: {}", e)))
    }

    /// GET `url` and decode the JSON body. A 404 is `Ok(None)` when
    /// `allow_missing` is set and a rejection otherwise.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(String, String)],
        timeout: Duration,
        describe: &str,
        allow_missing: bool,
    ) -> UpstreamResult<Option<T>> {
        let _permit = self.throttle().await?;
        self.tracker.record_request();

        let result = self
            .send(url, params, timeout, describe, allow_missing)
            .await;
        match &result {
            Ok(_) => self.tracker.record_success(),
            Err(err) => self.tracker.record_error(err),
        }
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(String, String)],
        timeout: Duration,
        describe: &str,
        allow_missing: bool,
    ) -> UpstreamResult<Option<T>> {
        let response = self
            .client
            .get(url)
            .query(params)
            .header("Accept", "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .json::<T>()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        UpstreamError::Timeout { budget: timeout }
                    } else {
                        invalid_response(format!("Failed to parse response: {}", e))
                    }
                })?;
            return Ok(Some(body));
        }

        if status == StatusCode::NOT_FOUND && allow_missing {
            return Ok(None);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(status_error(status, &body, describe))
    }
}

fn transport_error(err: reqwest::Error, budget: Duration) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout { budget }
    } else {
        unavailable(format!("HTTP request failed: {}", err))
    }
}

/// 4xx means the query itself is wrong; 429 and 5xx are transient.
fn status_error(status: StatusCode, body: &str, describe: &str) -> UpstreamError {
    let message = truncate_body(body, MAX_ERROR_BODY);
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        UpstreamError::Rejected {
            status: status.as_u16(),
            message,
            query: describe.to_string(),
        }
    } else {
        unavailable(format!("HTTP {}: {}", status.as_u16(), message))
    }
}

#[async_trait]
impl RegistryClient for ClinicalTrialsClient {
    async fn search(&self, request: &UpstreamRequest) -> UpstreamResult<RegistryPage> {
        let describe = request.describe();
        tracing::debug!(kind = ?request.kind, query = %describe, "registry search");

        let response: Option<StudiesResponse> = self
            .get_json(&self.base_url, &request.params, request.timeout, &describe, false)
            .await?;

        response
            .map(RegistryPage::from)
            .ok_or_else(|| invalid_response("Empty search response"))
    }

    async fn study(&self, trial_id: &str, timeout: Duration) -> UpstreamResult<Option<TrialRecord>> {
        let url = format!("{}/{}", self.base_url, trial_id);
        tracing::debug!(trial_id = %trial_id, "registry study lookup");

        let study: Option<Study> = self.get_json(&url, &[], timeout, trial_id, true).await?;
        Ok(study.map(TrialRecord::from))
    }
}

impl std::fmt::Debug for ClinicalTrialsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClinicalTrialsClient")
            .field("base_url", &self.base_url)
            .field("min_request_interval", &self.pacer.interval())
            .field("tracker", &self.tracker)
            .finish()
    }
}
