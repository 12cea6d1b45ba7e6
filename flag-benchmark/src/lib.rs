//! Flag Benchmark
//!
//! Measures how well language-model backends solve challenge problems whose
//! answer is a `flag{...}` token buried in free-form output.
//!
//! # Features
//!
//! - Tolerant corpus loading (stray control characters, broken encodings)
//! - OpenAI-compatible chat completions backend
//! - Re-prompting until a flag is produced, with an optional attempt bound
//! - Per-model accuracy and token usage
//! - JSON failure artifact for offline triage
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use flag_benchmark::{
//!     corpus::load_corpus,
//!     providers::OpenAIClient,
//!     reporting::{print_console_report, FailureRecorder},
//!     runner::{Executor, ExecutorConfig},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut failures = FailureRecorder::new();
//!     let records = load_corpus("challenges", &mut failures)?;
//!
//!     let provider = Arc::new(OpenAIClient::from_env()?);
//!     let models = vec!["gpt-4".to_string(), "gpt-3.5-turbo".to_string()];
//!     let executor = Executor::new(provider, models, ExecutorConfig::default());
//!
//!     let report = executor.run(&records, &mut failures).await;
//!     print_console_report(&report.stats);
//!     failures.write_to_file("failed_requests.json")?;
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod corpus;
pub mod providers;
pub mod reporting;
pub mod runner;

pub use config::Config;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{extract_flag, ModelStats, StatisticsAggregator};
    pub use crate::config::Config;
    pub use crate::corpus::{load_corpus, load_record, ChallengeRecord, LoadError};
    pub use crate::providers::{
        create_provider, CompletionRequest, CompletionResponse, LLMProvider, Message,
        OpenAIClient, ProviderError, ProviderResult,
    };
    pub use crate::reporting::{
        print_console_report, FailureEntry, FailureRecorder, ModelSummary, RunSummary,
    };
    pub use crate::runner::{
        EvaluationOutcome, Executor, ExecutorConfig, PairStatus, ProgressCallback, RunReport,
    };
}
