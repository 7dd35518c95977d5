//! Upstream request/response shapes shared by the executor and registry clients

use crate::trial::TrialRecord;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What an upstream call is for; decides its timeout budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    DataPage,
    CountProbe,
}

/// A fully built upstream search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub params: Vec<(String, String)>,
    pub kind: RequestKind,
    pub timeout: Duration,
}

impl UpstreamRequest {
    pub fn new(kind: RequestKind, timeout: Duration) -> Self {
        Self {
            params: Vec::new(),
            kind,
            timeout,
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.push((name.into(), value.into()));
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some()
    }

    /// Unencoded `k=v&k=v`, for logs and error messages.
    pub fn describe(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// One page returned by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryPage {
    pub records: Vec<TrialRecord>,
    pub total_count: Option<u64>,
    pub next_page_token: Option<String>,
}

impl RegistryPage {
    pub fn new(records: Vec<TrialRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn with_total(mut self, total: u64) -> Self {
        self.total_count = Some(total);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.next_page_token = Some(token.into());
        self
    }
}
