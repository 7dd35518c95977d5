//! Per-record plain-language summaries for detailed outcomes

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use trialscope_core::{EnrichedTrial, TrialRecord};
use trialscope_registry::{TrialSummarizer, SUMMARY_FALLBACK};

/// Attaches summaries; a failing summary never fails the batch.
#[derive(Clone)]
pub struct Enricher {
    summarizer: Arc<dyn TrialSummarizer>,
    timeout: Duration,
}

impl Enricher {
    pub fn new(summarizer: Arc<dyn TrialSummarizer>, timeout: Duration) -> Self {
        Self {
            summarizer,
            timeout,
        }
    }

    /// Summaries run concurrently; output order matches input order.
    pub async fn enrich(&self, records: Vec<TrialRecord>) -> Vec<EnrichedTrial> {
        join_all(records.into_iter().map(|record| self.enrich_one(record))).await
    }

    async fn enrich_one(&self, record: TrialRecord) -> EnrichedTrial {
        let input = record.summary_input();
        let summary = match tokio::time::timeout(self.timeout, self.summarizer.summarize(&input)).await {
            Ok(Ok(summary)) => summary,
            Ok(Err(err)) => {
                warn!(
                    trial_id = %record.nct_id,
                    provider = self.summarizer.name(),
                    error = %err,
                    "summary failed, using fallback"
                );
                SUMMARY_FALLBACK.to_string()
            }
            Err(_) => {
                warn!(
                    trial_id = %record.nct_id,
                    provider = self.summarizer.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "summary timed out, using fallback"
                );
                SUMMARY_FALLBACK.to_string()
            }
        };
        EnrichedTrial::new(record, summary)
    }
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("summarizer", &self.summarizer.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trialscope_registry::TemplateSummarizer;
    use trialscope_test_utils::fixtures::trials;
    use trialscope_test_utils::{FailingSummarizer, MockSummarizer};

    #[tokio::test]
    async fn test_order_and_fallback() {
        let summarizer = Arc::new(MockSummarizer::new().failing_for(["NCT00000002"]));
        let enricher = Enricher::new(summarizer.clone(), Duration::from_secs(1));

        let enriched = enricher.enrich(trials(3)).await;
        let ids: Vec<&str> = enriched.iter().map(|e| e.trial.nct_id.as_str()).collect();
        assert_eq!(ids, ["NCT00000001", "NCT00000002", "NCT00000003"]);
        assert_eq!(enriched[0].plain_summary, "Summary of NCT00000001");
        assert_eq!(enriched[1].plain_summary, SUMMARY_FALLBACK);
        assert_eq!(enriched[2].official_url, "https://clinicaltrials.gov/study/NCT00000003");
        assert_eq!(summarizer.call_count(), 3);
    }

    #[tokio::test]
    async fn test_every_record_survives_a_dead_summarizer() {
        let enricher = Enricher::new(Arc::new(FailingSummarizer), Duration::from_secs(1));
        let enriched = enricher.enrich(trials(2)).await;
        assert_eq!(enriched.len(), 2);
        assert!(enriched.iter().all(|e| e.plain_summary == SUMMARY_FALLBACK));
    }

    #[tokio::test]
    async fn test_template_summarizer() {
        let enricher = Enricher::new(Arc::new(TemplateSummarizer::new()), Duration::from_secs(1));
        let enriched = enricher.enrich(trials(1)).await;
        assert!(enriched[0].plain_summary.contains("lung cancer"));
    }
}
