//! Detailed vs count-only classification

use trialscope_core::{ResultKind, SearchConfig};

/// Decides how much of a result set is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultClassifier {
    threshold: u64,
}

impl Default for ResultClassifier {
    fn default() -> Self {
        Self { threshold: 10 }
    }
}

impl ResultClassifier {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.detail_threshold)
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Detailed iff `total <= threshold`.
    pub fn classify(&self, total: u64) -> ResultKind {
        if total <= self.threshold {
            ResultKind::Detailed
        } else {
            ResultKind::CountOnly
        }
    }
}
