//! OpenAI trial summarizer

use super::client::OpenAIClient;
use super::types::{CompletionRequest, CompletionResponse, Message};
use crate::providers::summarization_failed;
use crate::TrialSummarizer;
use async_trait::async_trait;
use trialscope_core::{SummaryInput, TrialScopeResult};

const SYSTEM_PROMPT: &str = "You explain clinical trials to patients and caregivers. \
     Write two or three short sentences in plain language: what the study is testing, \
     who it is for, and where it stands. Avoid jargon and do not give medical advice.";

/// Plain-language summaries via chat completions.
pub struct OpenAITrialSummarizer {
    client: OpenAIClient,
    model: String,
    max_tokens: i32,
}

impl OpenAITrialSummarizer {
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (e.g., "gpt-4o-mini")
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: OpenAIClient::new(api_key, 60),
            model: model.into(),
            max_tokens: 200,
        }
    }

    pub fn with_default_model(api_key: impl Into<String>) -> Self {
        Self::new(api_key, "gpt-4o-mini")
    }

    pub fn with_client(mut self, client: OpenAIClient) -> Self {
        self.client = client;
        self
    }

    fn build_prompt(input: &SummaryInput) -> String {
        let mut prompt = format!("Trial {}: {}\n", input.id, input.title);
        for (label, value) in [
            ("Condition", &input.condition),
            ("Phase", &input.phase),
            ("Status", &input.status),
            ("Description", &input.brief_description),
        ] {
            if let Some(value) = value {
                prompt.push_str(&format!("{}: {}\n", label, value));
            }
        }
        prompt
    }
}

#[async_trait]
impl TrialSummarizer for OpenAITrialSummarizer {
    async fn summarize(&self, input: &SummaryInput) -> TrialScopeResult<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(Self::build_prompt(input)),
            ],
            max_tokens: Some(self.max_tokens),
            temperature: Some(0.3),
        };

        let response: CompletionResponse = self.client.request("chat/completions", request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .filter(|summary| !summary.is_empty())
            .ok_or_else(|| summarization_failed("openai", "No completion in response"))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

impl std::fmt::Debug for OpenAITrialSummarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAITrialSummarizer")
            .field("model", &self.model)
            .finish()
    }
}
