//! Per-model running totals

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Running aggregate for one model identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStats {
    pub tokens_used: u64,
    pub correct_count: u64,
    pub total_count: u64,
}

impl ModelStats {
    /// `correct_count / total_count`, or 0 when nothing was attempted
    pub fn accuracy(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.total_count as f64
        }
    }
}

/// Owns the [`ModelStats`] of every registered model.
///
/// Updates only ever add, so the final totals do not depend on the order
/// in which pairs complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsAggregator {
    stats: IndexMap<String, ModelStats>,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an aggregator with zeroed entries for each model
    pub fn with_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut agg = Self::new();
        for model in models {
            agg.register(model);
        }
        agg
    }

    /// Register a model with zeroed totals. Re-registering keeps existing totals.
    pub fn register(&mut self, model: impl Into<String>) {
        self.stats.entry(model.into()).or_default();
    }

    /// Record one completed pair
    pub fn record(&mut self, model: &str, tokens_used_delta: u64, was_correct: bool) {
        let entry = self.stats.entry(model.to_string()).or_default();
        entry.tokens_used += tokens_used_delta;
        entry.total_count += 1;
        if was_correct {
            entry.correct_count += 1;
        }
    }

    pub fn get(&self, model: &str) -> Option<&ModelStats> {
        self.stats.get(model)
    }

    /// Accuracy for a model; unknown models report 0
    pub fn accuracy(&self, model: &str) -> f64 {
        self.stats.get(model).map(ModelStats::accuracy).unwrap_or(0.0)
    }

    /// Models in registration order with their totals
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelStats)> {
        self.stats.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}
