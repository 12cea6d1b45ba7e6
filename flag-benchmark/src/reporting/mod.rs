//! Results reporting

pub mod failures;

pub use failures::{FailureEntry, FailureRecorder};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::analysis::StatisticsAggregator;
use crate::runner::{EvaluationOutcome, RunReport};

/// Totals for one model as handed to reporting and plotting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model: String,
    pub tokens_used: u64,
    pub correct_count: u64,
    pub total_count: u64,
    pub accuracy: f64,
}

/// JSON summary export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub timestamp: String,
    pub total_records: usize,
    pub failure_count: usize,
    pub models: Vec<ModelSummary>,
}

/// Per-model rows in registration order
pub fn model_summaries(stats: &StatisticsAggregator) -> Vec<ModelSummary> {
    stats
        .iter()
        .map(|(model, s)| ModelSummary {
            model: model.to_string(),
            tokens_used: s.tokens_used,
            correct_count: s.correct_count,
            total_count: s.total_count,
            accuracy: s.accuracy(),
        })
        .collect()
}

impl RunSummary {
    pub fn from_report(
        run_id: impl Into<String>,
        report: &RunReport,
        failures: &FailureRecorder,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_records: report.total_records,
            failure_count: failures.len(),
            models: model_summaries(&report.stats),
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}

/// Write every pair outcome as a JSON array
pub fn write_outcomes(outcomes: &[EvaluationOutcome], path: impl AsRef<Path>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(outcomes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

/// Generate a console report
pub fn print_console_report(stats: &StatisticsAggregator) {
    println!("\n=== Flag Benchmark Results ===\n");

    for row in model_summaries(stats) {
        println!("Model: {}", row.model);
        println!("Total Tokens Used: {}", row.tokens_used);
        println!("Correct Answers: {}/{}", row.correct_count, row.total_count);
        println!("Accuracy: {:.2}", row.accuracy);
        println!("{:-<40}", "");
    }
}
