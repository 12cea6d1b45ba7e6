//! Evaluation controller: drives the prompt/extract/re-prompt loop per pair

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use crate::analysis::{extract_flag, StatisticsAggregator};
use crate::corpus::ChallengeRecord;
use crate::providers::{
    CompletionRequest, CompletionResponse, LLMProvider, ProviderError, DEFAULT_TEMPERATURE,
};
use crate::reporting::{FailureEntry, FailureRecorder};

/// Appended to the working description whenever a response carries no flag
pub const CLARIFYING_SUFFIX: &str =
    "\nI couldn't find the flag in your previous response. Could you please provide the flag again?";

/// Configuration for the executor
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Sampling temperature for every request
    pub temperature: f32,
    /// Maximum requests per pair; `None` re-prompts until a flag or an error
    pub max_attempts: Option<u32>,
    /// Per-request timeout in milliseconds; `None` waits for the backend
    pub timeout_ms: Option<u64>,
    /// Evaluate every model of a record concurrently
    pub parallel_models: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_attempts: Some(10),
            timeout_ms: None,
            parallel_models: false,
        }
    }
}

/// Terminal state of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairStatus {
    /// A flag was extracted (not necessarily the right one)
    Succeeded,
    /// A backend call failed
    Failed,
    /// The attempt bound was reached without a flag
    Exhausted,
}

/// Result of one (record, model) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub source: String,
    pub model: String,
    pub answer: Option<String>,
    /// Backend-reported tokens summed over every attempt of this pair
    pub tokens_used: u64,
    pub attempts: u32,
    pub status: PairStatus,
    pub correct: bool,
}

/// Everything a finished run hands to reporting
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub stats: StatisticsAggregator,
    pub outcomes: Vec<EvaluationOutcome>,
    pub total_records: usize,
}

/// Runs every record against every model
pub struct Executor {
    config: ExecutorConfig,
    provider: Arc<dyn LLMProvider>,
    models: Vec<String>,
    progress: Arc<dyn ProgressCallback>,
}

impl Executor {
    pub fn new(provider: Arc<dyn LLMProvider>, models: Vec<String>, config: ExecutorConfig) -> Self {
        Self {
            config,
            provider,
            models,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Attach a progress listener
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Evaluate every record against every model.
    ///
    /// Each pair updates the statistics exactly once. Failures are appended
    /// to `failures` in corpus order, or in completion order when models run
    /// in parallel.
    pub async fn run(&self, records: &[ChallengeRecord], failures: &mut FailureRecorder) -> RunReport {
        let mut report = RunReport {
            stats: StatisticsAggregator::with_models(self.models.iter().cloned()),
            outcomes: Vec::with_capacity(records.len() * self.models.len()),
            total_records: records.len(),
        };
        let total_pairs = records.len() * self.models.len();

        tracing::info!(
            "Evaluating {} records against {} models ({})",
            records.len(),
            self.models.len(),
            if self.config.parallel_models { "parallel" } else { "sequential" }
        );

        for record in records {
            if self.config.parallel_models {
                self.run_record_parallel(record, &mut report, failures).await;
            } else {
                for model in &self.models {
                    let (outcome, failure) = self.evaluate_pair(record, model).await;
                    self.apply(outcome, failure, &mut report, failures);
                }
            }
            self.progress.on_progress(report.outcomes.len(), total_pairs);
        }

        report
    }

    async fn run_record_parallel(
        &self,
        record: &ChallengeRecord,
        report: &mut RunReport,
        failures: &mut FailureRecorder,
    ) {
        let mut join_set = JoinSet::new();
        for model in &self.models {
            let executor = self.clone_for_task();
            let record = record.clone();
            let model = model.clone();
            join_set.spawn(async move { executor.evaluate_pair(&record, &model).await });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((outcome, failure)) => self.apply(outcome, failure, report, failures),
                Err(e) => tracing::error!("Pair evaluation panicked for {}: {}", record.source, e),
            }
        }
    }

    fn apply(
        &self,
        outcome: EvaluationOutcome,
        failure: Option<FailureEntry>,
        report: &mut RunReport,
        failures: &mut FailureRecorder,
    ) {
        if let Some(entry) = failure {
            failures.append(entry);
        }
        report
            .stats
            .record(&outcome.model, outcome.tokens_used, outcome.correct);
        self.progress
            .on_pair_complete(&outcome.source, &outcome.model, outcome.status);
        report.outcomes.push(outcome);
    }

    /// Drive one pair to a terminal state.
    ///
    /// The record itself is never mutated; re-prompts extend a working copy of
    /// its description. Returns the failure entry to record when the pair fails.
    pub async fn evaluate_pair(
        &self,
        record: &ChallengeRecord,
        model: &str,
    ) -> (EvaluationOutcome, Option<FailureEntry>) {
        self.progress.on_pair_start(&record.source, model);

        let mut working = record.description.clone();
        let mut tokens_used = 0u64;
        let mut attempts = 0u32;

        let outcome = |status: PairStatus, answer: Option<String>, tokens_used: u64, attempts: u32| {
            let correct = status == PairStatus::Succeeded
                && answer.as_deref().is_some_and(|a| record.is_correct(a));
            EvaluationOutcome {
                source: record.source.clone(),
                model: model.to_string(),
                answer,
                tokens_used,
                attempts,
                status,
                correct,
            }
        };

        loop {
            attempts += 1;
            tracing::debug!("Attempt {} for {} on {}", attempts, record.source, model);

            let response = match self.invoke(model, &working).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!("Error calling API for model {}: {}", model, e);
                    let failure = FailureEntry::request(model, working, e.to_string());
                    return (outcome(PairStatus::Failed, None, tokens_used, attempts), Some(failure));
                }
            };
            tokens_used += response.total_tokens;

            if let Some(token) = extract_flag(&response.content) {
                let answer = Some(token.to_string());
                return (outcome(PairStatus::Succeeded, answer, tokens_used, attempts), None);
            }

            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                tracing::warn!(
                    "No flag from {} for {} after {} attempts",
                    model,
                    record.source,
                    attempts
                );
                return (outcome(PairStatus::Exhausted, None, tokens_used, attempts), None);
            }

            tracing::debug!("No flag in response from {}, asking again", model);
            working.push_str(CLARIFYING_SUFFIX);
        }
    }

    /// Single backend call with the configured temperature and timeout
    async fn invoke(&self, model: &str, prompt: &str) -> Result<CompletionResponse, ProviderError> {
        let request =
            CompletionRequest::user_prompt(model, prompt).with_temperature(self.config.temperature);

        match self.config.timeout_ms {
            Some(timeout_ms) => {
                let timeout = Duration::from_millis(timeout_ms);
                match tokio::time::timeout(timeout, self.provider.complete(&request)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout { timeout_ms }),
                }
            }
            None => self.provider.complete(&request).await,
        }
    }

    /// Clone the executor for spawning tasks
    fn clone_for_task(&self) -> Self {
        Self {
            config: self.config.clone(),
            provider: self.provider.clone(),
            models: self.models.clone(),
            progress: self.progress.clone(),
        }
    }
}

/// Progress listener; never part of the data path
pub trait ProgressCallback: Send + Sync {
    fn on_pair_start(&self, source: &str, model: &str);
    fn on_pair_complete(&self, source: &str, model: &str, status: PairStatus);
    fn on_progress(&self, completed: usize, total: usize);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_pair_start(&self, _source: &str, _model: &str) {}
    fn on_pair_complete(&self, _source: &str, _model: &str, _status: PairStatus) {}
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Console progress callback
pub struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_pair_start(&self, source: &str, model: &str) {
        println!("  Starting {} on {}...", source, model);
    }

    fn on_pair_complete(&self, source: &str, model: &str, status: PairStatus) {
        let label = match status {
            PairStatus::Succeeded => "OK",
            PairStatus::Failed => "FAILED",
            PairStatus::Exhausted => "NO FLAG",
        };
        println!("  {} {} on {}", label, source, model);
    }

    fn on_progress(&self, completed: usize, total: usize) {
        println!("Progress: {}/{} pairs complete", completed, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use crate::providers::ProviderResult;

    /// Replays canned responses per model and records every request
    #[derive(Default)]
    struct ScriptedProvider {
        scripts: Mutex<HashMap<String, VecDeque<ProviderResult<CompletionResponse>>>>,
        calls: Mutex<Vec<CompletionRequest>>,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn new() -> Self {
            Self::default()
        }

        fn reply(self, model: &str, content: &str, tokens: u64) -> Self {
            self.push(model, Ok(CompletionResponse::text(model, content, tokens)))
        }

        fn fail(self, model: &str, error: ProviderError) -> Self {
            self.push(model, Err(error))
        }

        fn push(self, model: &str, item: ProviderResult<CompletionResponse>) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .entry(model.to_string())
                .or_default()
                .push_back(item);
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn prompts_for(&self, model: &str) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.model == model)
                .map(|r| r.messages[0].content.clone())
                .collect()
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
            self.calls.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.scripts
                .lock()
                .unwrap()
                .get_mut(&request.model)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| Err(ProviderError::Config("script exhausted".to_string())))
        }
    }

    fn record() -> ChallengeRecord {
        ChallengeRecord::new("chal.json", "solve this", "flag{win}")
    }

    fn executor(provider: Arc<ScriptedProvider>, models: &[&str], config: ExecutorConfig) -> Executor {
        Executor::new(
            provider,
            models.iter().map(|m| m.to_string()).collect(),
            config,
        )
    }

    #[tokio::test]
    async fn test_first_response_correct() {
        let provider = Arc::new(ScriptedProvider::new().reply("M", "I think the answer is flag{win}", 42));
        let exec = executor(provider.clone(), &["M"], ExecutorConfig::default());
        let mut failures = FailureRecorder::new();

        let report = exec.run(&[record()], &mut failures).await;

        let stats = report.stats.get("M").unwrap();
        assert_eq!(stats.tokens_used, 42);
        assert_eq!(stats.correct_count, 1);
        assert_eq!(stats.total_count, 1);
        assert!(failures.is_empty());

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].messages.len(), 1);
        assert_eq!(calls[0].messages[0].role, "user");
        assert_eq!(calls[0].temperature, 0.7);
    }

    #[tokio::test]
    async fn test_retry_appends_clarifying_suffix() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .reply("M", "I am not sure.", 10)
                .reply("M", "Sorry! flag{win}", 15),
        );
        let exec = executor(provider.clone(), &["M"], ExecutorConfig::default());
        let mut failures = FailureRecorder::new();

        let report = exec.run(&[record()], &mut failures).await;

        let stats = report.stats.get("M").unwrap();
        assert_eq!(stats.tokens_used, 25);
        assert_eq!(stats.correct_count, 1);
        assert_eq!(stats.total_count, 1);
        assert_eq!(report.outcomes[0].attempts, 2);

        let prompts = provider.prompts_for("M");
        assert_eq!(prompts[0], "solve this");
        assert_eq!(prompts[1], format!("solve this{}", CLARIFYING_SUFFIX));
    }

    #[tokio::test]
    async fn test_backend_failure_on_first_call() {
        let provider = Arc::new(ScriptedProvider::new().fail(
            "M",
            ProviderError::Api { status: 503, message: "unavailable".to_string() },
        ));
        let exec = executor(provider, &["M"], ExecutorConfig::default());
        let mut failures = FailureRecorder::new();

        let report = exec.run(&[record()], &mut failures).await;

        let stats = report.stats.get("M").unwrap();
        assert_eq!(stats.tokens_used, 0);
        assert_eq!(stats.correct_count, 0);
        assert_eq!(stats.total_count, 1);
        assert_eq!(report.outcomes[0].status, PairStatus::Failed);
        assert_eq!(
            failures.entries(),
            &[FailureEntry::request("M", "solve this", "API error: 503 - unavailable")]
        );
    }

    #[tokio::test]
    async fn test_failure_after_retry_keeps_tokens_and_working_description() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .reply("M", "hmm", 10)
                .fail("M", ProviderError::Parse("No usage in response".to_string())),
        );
        let exec = executor(provider, &["M"], ExecutorConfig::default());
        let mut failures = FailureRecorder::new();

        let report = exec.run(&[record()], &mut failures).await;

        assert_eq!(report.stats.get("M").unwrap().tokens_used, 10);
        assert_eq!(report.stats.get("M").unwrap().total_count, 1);
        match &failures.entries()[0] {
            FailureEntry::RequestFailure { model, description, .. } => {
                assert_eq!(model, "M");
                assert_eq!(description, &format!("solve this{}", CLARIFYING_SUFFIX));
            }
            other => panic!("Expected RequestFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_flag_is_success_but_incorrect() {
        let provider = Arc::new(ScriptedProvider::new().reply("M", "flag{lose} or flag{win}", 7));
        let exec = executor(provider.clone(), &["M"], ExecutorConfig::default());
        let mut failures = FailureRecorder::new();

        let report = exec.run(&[record()], &mut failures).await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, PairStatus::Succeeded);
        assert_eq!(outcome.answer.as_deref(), Some("flag{lose}"));
        assert!(!outcome.correct);
        assert_eq!(report.stats.get("M").unwrap().correct_count, 0);
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_attempt_bound_exhausts() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .reply("M", "no", 5)
                .reply("M", "still no", 5)
                .reply("M", "nope", 5)
                .reply("M", "flag{win}", 5),
        );
        let config = ExecutorConfig { max_attempts: Some(3), ..Default::default() };
        let exec = executor(provider.clone(), &["M"], config);
        let mut failures = FailureRecorder::new();

        let report = exec.run(&[record()], &mut failures).await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, PairStatus::Exhausted);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.tokens_used, 15);
        assert!(!outcome.correct);
        assert_eq!(report.stats.get("M").unwrap().total_count, 1);
        assert!(failures.is_empty());

        let prompts = provider.prompts_for("M");
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[2], format!("solve this{}{}", CLARIFYING_SUFFIX, CLARIFYING_SUFFIX));
    }

    #[tokio::test]
    async fn test_unbounded_retries_until_flag() {
        let mut provider = ScriptedProvider::new();
        for _ in 0..15 {
            provider = provider.reply("M", "thinking...", 1);
        }
        let provider = Arc::new(provider.reply("M", "flag{win}", 1));
        let config = ExecutorConfig { max_attempts: None, ..Default::default() };
        let exec = executor(provider, &["M"], config);
        let mut failures = FailureRecorder::new();

        let report = exec.run(&[record()], &mut failures).await;

        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, PairStatus::Succeeded);
        assert_eq!(outcome.attempts, 16);
        assert_eq!(outcome.tokens_used, 16);
        assert!(outcome.correct);
    }

    #[tokio::test]
    async fn test_each_model_gets_fresh_description() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .reply("A", "no flag", 1)
                .reply("A", "flag{win}", 1)
                .reply("B", "flag{win}", 1),
        );
        let exec = executor(provider.clone(), &["A", "B"], ExecutorConfig::default());
        let mut failures = FailureRecorder::new();
        let records = vec![record()];

        exec.run(&records, &mut failures).await;

        assert_eq!(provider.prompts_for("B"), vec!["solve this".to_string()]);
        assert_eq!(records[0].description, "solve this");
    }

    #[tokio::test]
    async fn test_timeout_is_backend_failure() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .reply("M", "flag{win}", 3)
                .with_delay(Duration::from_millis(500)),
        );
        let config = ExecutorConfig { timeout_ms: Some(20), ..Default::default() };
        let exec = executor(provider, &["M"], config);
        let mut failures = FailureRecorder::new();

        let report = exec.run(&[record()], &mut failures).await;

        assert_eq!(report.outcomes[0].status, PairStatus::Failed);
        assert_eq!(report.stats.get("M").unwrap().tokens_used, 0);
        assert_eq!(
            failures.entries(),
            &[FailureEntry::request("M", "solve this", "Timeout after 20ms")]
        );
    }

    #[tokio::test]
    async fn test_parallel_models_match_sequential_totals() {
        let script = || {
            ScriptedProvider::new()
                .reply("A", "flag{win}", 4)
                .reply("B", "no", 2)
                .reply("B", "flag{nope}", 3)
                .fail("C", ProviderError::Api { status: 500, message: "boom".to_string() })
        };
        let models = ["A", "B", "C"];

        let sequential = executor(Arc::new(script()), &models, ExecutorConfig::default());
        let mut seq_failures = FailureRecorder::new();
        let seq = sequential.run(&[record()], &mut seq_failures).await;

        let config = ExecutorConfig { parallel_models: true, ..Default::default() };
        let parallel = executor(Arc::new(script()), &models, config);
        let mut par_failures = FailureRecorder::new();
        let par = parallel.run(&[record()], &mut par_failures).await;

        for model in models {
            assert_eq!(seq.stats.get(model), par.stats.get(model), "model {}", model);
        }
        assert_eq!(par.outcomes.len(), 3);
        assert_eq!(seq_failures.entries(), par_failures.entries());
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let exec = executor(Arc::new(ScriptedProvider::new()), &["A", "B"], ExecutorConfig::default());
        let mut failures = FailureRecorder::new();

        let report = exec.run(&[], &mut failures).await;

        assert_eq!(report.stats.len(), 2);
        assert_eq!(report.stats.accuracy("A"), 0.0);
        assert!(report.outcomes.is_empty());
        assert!(failures.is_empty());
    }
}
