//! OpenAI provider implementation
//!
//! Chat-completion based plain-language summaries of trials.

pub mod client;
pub mod summarization;
pub mod types;

pub use client::OpenAIClient;
pub use summarization::OpenAITrialSummarizer;
