//! Benchmark execution engine

pub mod executor;

pub use executor::{
    ConsoleProgress, EvaluationOutcome, Executor, ExecutorConfig, NoOpProgress, PairStatus,
    ProgressCallback, RunReport, CLARIFYING_SUFFIX,
};
