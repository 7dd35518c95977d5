//! OpenAI HTTP client with rate limiting

use super::types::ApiError;
use crate::providers::{summarization_failed, truncate_body, RequestPacer};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use trialscope_core::TrialScopeResult;

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// JSON-over-HTTP access to the completions API, paced per minute.
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    pacer: RequestPacer,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
            pacer: RequestPacer::per_minute(requests_per_minute),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// POST `body` to `endpoint` and decode the reply.
    pub async fn request<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Req,
    ) -> TrialScopeResult<Res> {
        let _permit = self
            .pacer
            .acquire()
            .await
            .map_err(|e| summarization_failed(PROVIDER, format!("Rate limiter error: {}", e)))?;

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| summarization_failed(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                summarization_failed(PROVIDER, format!("Failed to parse response: {}", e))
            });
        }

        let text = response.text().await.unwrap_or_default();
        Err(error_for(status, &text))
    }
}

fn error_for(status: StatusCode, body: &str) -> trialscope_core::TrialScopeError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return summarization_failed(PROVIDER, "rate limited");
    }
    let message = serde_json::from_str::<ApiError>(body)
        .map(|api_error| api_error.error.message)
        .unwrap_or_else(|_| truncate_body(body, 200));
    summarization_failed(PROVIDER, format!("HTTP {}: {}", status.as_u16(), message))
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}
