//! End-to-end: corpus directory -> evaluation -> failure artifact and summary

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use flag_benchmark::prelude::*;
use flag_benchmark::reporting::model_summaries;

/// Deterministic backend: answers with the flag hidden in the prompt after a
/// `secret:` marker, needs one re-prompt for "slow" models, and fails for
/// prompts mentioning "crash".
struct EchoBackend;

#[async_trait]
impl LLMProvider for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let prompt = &request.messages[0].content;
        if prompt.contains("crash") {
            return Err(ProviderError::Api {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        if request.model == "slow" && !prompt.contains("provide the flag again") {
            return Ok(CompletionResponse::text(&request.model, "Let me think.", 10));
        }
        let answer = prompt
            .split("secret:")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or("no idea");
        Ok(CompletionResponse::text(
            &request.model,
            format!("The answer is {}", answer),
            20,
        ))
    }
}

fn write_corpus(dir: &Path) {
    std::fs::write(
        dir.join("01_easy.json"),
        r#"{"description": "secret: flag{one}", "flag": "flag{one}"}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("02_wrong.json"),
        r#"{"description": "secret: flag{decoy}", "flag": "flag{real}"}"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("03_crash.json"),
        r#"{"description": "crash please", "flag": "flag{never}"}"#,
    )
    .unwrap();
    // Raw control bytes inside the string literal; readable once stripped.
    std::fs::write(
        dir.join("04_dirty.json"),
        b"{\"description\": \"secret:\x01 flag{four}\", \"flag\": \"flag{four}\x1f\"}",
    )
    .unwrap();
    std::fs::write(dir.join("05_broken.json"), r#"{"description": "#).unwrap();
}

async fn run_once(dir: &Path) -> (RunReport, FailureRecorder) {
    let mut failures = FailureRecorder::new();
    let records = load_corpus(dir, &mut failures).unwrap();

    let executor = Executor::new(
        Arc::new(EchoBackend),
        vec!["fast".to_string(), "slow".to_string()],
        ExecutorConfig::default(),
    );
    let report = executor.run(&records, &mut failures).await;
    (report, failures)
}

#[tokio::test]
async fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let (report, failures) = run_once(dir.path()).await;

    assert_eq!(report.total_records, 4);

    let fast = report.stats.get("fast").unwrap();
    assert_eq!(fast.total_count, 4);
    assert_eq!(fast.correct_count, 2);
    assert_eq!(fast.tokens_used, 60);

    let slow = report.stats.get("slow").unwrap();
    assert_eq!(slow.total_count, 4);
    assert_eq!(slow.correct_count, 2);
    // Three answered records cost 10 + 20 each; the crash costs nothing.
    assert_eq!(slow.tokens_used, 90);
    assert_eq!(report.stats.accuracy("slow"), 0.5);

    let entries = failures.entries();
    assert_eq!(entries.len(), 3);
    assert!(matches!(
        &entries[0],
        FailureEntry::LoadFailure { source, .. } if source.ends_with("05_broken.json")
    ));
    assert_eq!(
        entries[1],
        FailureEntry::request("fast", "crash please", "API error: 500 - internal error")
    );
    assert!(matches!(&entries[2], FailureEntry::RequestFailure { model, .. } if model == "slow"));

    let out = dir.path().join("failed_requests.json");
    failures.write_to_file(&out).unwrap();
    let parsed: Vec<FailureEntry> =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(parsed, entries);
}

#[tokio::test]
async fn test_rerun_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let (first, first_failures) = run_once(dir.path()).await;
    let (second, second_failures) = run_once(dir.path()).await;

    assert_eq!(model_summaries(&first.stats), model_summaries(&second.stats));
    assert_eq!(first.outcomes, second.outcomes);
    assert_eq!(first_failures.entries(), second_failures.entries());
}

#[tokio::test]
async fn test_empty_corpus_still_reports() {
    let dir = tempfile::tempdir().unwrap();

    let (report, failures) = run_once(dir.path()).await;

    let rows = model_summaries(&report.stats);
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.total_count == 0 && r.accuracy == 0.0));

    let mut buf = Vec::new();
    failures.flush_to(&mut buf).unwrap();
    assert_eq!(buf, b"[]");
}
