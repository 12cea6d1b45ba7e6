//! Challenge records and corpus loading

pub mod loader;

pub use loader::{
    load_corpus, load_record, load_record_from_file, strip_control_chars, LoadError,
};

use serde::{Deserialize, Serialize};

/// One evaluation unit: a problem statement paired with its ground-truth flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    /// Identifier of the corpus item this record was loaded from
    pub source: String,
    /// Prompt sent to the model
    pub description: String,
    /// Ground-truth flag token
    pub correct_answer: String,
}

impl ChallengeRecord {
    pub fn new(
        source: impl Into<String>,
        description: impl Into<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            description: description.into(),
            correct_answer: correct_answer.into(),
        }
    }

    /// Exact, case-sensitive comparison against the ground truth.
    ///
    /// An empty ground truth never matches since no extracted token can be empty.
    pub fn is_correct(&self, answer: &str) -> bool {
        !self.correct_answer.is_empty() && answer == self.correct_answer
    }
}
