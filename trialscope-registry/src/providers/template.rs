//! Deterministic template summarizer (no network)

use crate::TrialSummarizer;
use async_trait::async_trait;
use trialscope_core::{SummaryInput, TrialScopeResult};

/// Builds a short plain-language description from the trial fields alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateSummarizer;

impl TemplateSummarizer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(input: &SummaryInput) -> String {
        let phase = input.phase.as_deref().map(describe_phase);
        let condition = input.condition.as_deref().filter(|c| !c.trim().is_empty());

        let mut summary = match (phase, condition) {
            (Some(phase), Some(condition)) => {
                format!("This {} study looks at {}.", phase, condition.to_lowercase())
            }
            (None, Some(condition)) => format!("This study looks at {}.", condition.to_lowercase()),
            (Some(phase), None) => format!("This is a {} study.", phase),
            (None, None) => format!("This study is titled \"{}\".", input.title.trim()),
        };

        if let Some(status) = input.status.as_deref().map(describe_status) {
            summary.push(' ');
            summary.push_str(&status);
        }

        if let Some(first) = input
            .brief_description
            .as_deref()
            .and_then(first_sentence)
        {
            summary.push(' ');
            summary.push_str(&first);
        }

        summary
    }
}

fn describe_phase(phase: &str) -> &'static str {
    match phase.to_ascii_uppercase().as_str() {
        "EARLY_PHASE1" => "early phase 1",
        "PHASE1" => "phase 1",
        "PHASE2" => "phase 2",
        "PHASE3" => "phase 3",
        "PHASE4" => "phase 4",
        _ => "clinical",
    }
}

fn describe_status(status: &str) -> String {
    match status.to_ascii_uppercase().as_str() {
        "RECRUITING" => "It is currently looking for participants.".to_string(),
        "NOT_YET_RECRUITING" => "It has not started enrolling participants yet.".to_string(),
        "ENROLLING_BY_INVITATION" => "It is enrolling participants by invitation only.".to_string(),
        "ACTIVE_NOT_RECRUITING" => "It is underway but no longer enrolling.".to_string(),
        "COMPLETED" => "It has finished.".to_string(),
        other => format!("Its status is {}.", other.replace('_', " ").to_lowercase()),
    }
}

fn first_sentence(text: &str) -> Option<String> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }
    let end = text.find(". ").map(|i| i + 1).unwrap_or(text.len());
    Some(text[..end].to_string())
}

#[async_trait]
impl TrialSummarizer for TemplateSummarizer {
    async fn summarize(&self, input: &SummaryInput) -> TrialScopeResult<String> {
        Ok(Self::render(input))
    }

    fn name(&self) -> &str {
        "template"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> SummaryInput {
        SummaryInput {
            id: "NCT03451162".into(),
            title: "Lung Screening".into(),
            condition: Some("Lung Cancer".into()),
            phase: Some("PHASE2".into()),
            brief_description: Some("Tests a new screening protocol.  Second sentence.".into()),
            status: Some("RECRUITING".into()),
        }
    }

    #[test]
    fn test_render_full_input() {
        assert_eq!(
            TemplateSummarizer::render(&input()),
            "This phase 2 study looks at lung cancer. It is currently looking for participants. \
             Tests a new screening protocol."
        );
    }

    #[test]
    fn test_render_title_only() {
        let bare = SummaryInput {
            condition: None,
            phase: None,
            brief_description: None,
            status: None,
            ..input()
        };
        assert_eq!(
            TemplateSummarizer::render(&bare),
            "This study is titled \"Lung Screening\"."
        );
    }

    #[test]
    fn test_unknown_status_is_spelled_out() {
        let suspended = SummaryInput {
            status: Some("SUSPENDED".into()),
            brief_description: None,
            ..input()
        };
        assert!(TemplateSummarizer::render(&suspended).ends_with("Its status is suspended."));
    }

    #[tokio::test]
    async fn test_trait_impl() {
        let summarizer = TemplateSummarizer::new();
        let summary = summarizer.summarize(&input()).await.unwrap();
        assert!(summary.contains("lung cancer"));
        assert_eq!(summarizer.name(), "template");
    }

    mod prop_tests {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_render_never_empty(
                title in ".{0,40}",
                condition in proptest::option::of("[a-zA-Z ]{0,20}"),
                phase in proptest::option::of("(PHASE[1-4]|NA|EARLY_PHASE1)"),
                status in proptest::option::of("[A-Z_]{1,20}"),
                description in proptest::option::of(".{0,80}"),
            ) {
                let input = SummaryInput {
                    id: "NCT00000001".into(),
                    title,
                    condition,
                    phase,
                    brief_description: description,
                    status,
                };
                prop_assert!(!TemplateSummarizer::render(&input).is_empty());
            }
        }
    }
}
