//! Answer extraction and per-model statistics

pub mod extractor;
pub mod stats;

pub use extractor::{extract_flag, FLAG_PATTERN};
pub use stats::{ModelStats, StatisticsAggregator};
