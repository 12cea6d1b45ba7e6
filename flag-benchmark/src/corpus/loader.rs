//! Challenge record loading from JSON corpus files

use std::path::{Path, PathBuf};

use super::ChallengeRecord;
use crate::reporting::{FailureEntry, FailureRecorder};

/// Error type for corpus loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON object, got {0}")]
    Shape(String),
}

/// Remove characters in the C0 control range and DEL.
///
/// Corpus files routinely contain stray bytes that make strict JSON parsing
/// fail; whitespace controls go too, which is harmless outside string literals.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(*c, '\u{0000}'..='\u{001f}' | '\u{007f}'))
        .collect()
}

/// Parse a single corpus item into a challenge record.
///
/// Missing or non-string `description`/`flag` fields become empty text.
pub fn load_record(source: &str, text: &str) -> Result<ChallengeRecord, LoadError> {
    let cleaned = strip_control_chars(text);
    let value: serde_json::Value = serde_json::from_str(&cleaned)?;

    let obj = value
        .as_object()
        .ok_or_else(|| LoadError::Shape(json_kind(&value).to_string()))?;

    let field = |name: &str| {
        obj.get(name)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    Ok(ChallengeRecord::new(source, field("description"), field("flag")))
}

/// Read and parse one corpus file. Invalid UTF-8 is replaced rather than rejected.
pub fn load_record_from_file(path: impl AsRef<Path>) -> Result<ChallengeRecord, LoadError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    load_record(&path.display().to_string(), &text)
}

/// Load every `*.json` file in `dir`, in file-name order.
///
/// Items that cannot be read or parsed are skipped and recorded as load
/// failures. Only a directory that cannot be listed is an error.
pub fn load_corpus(
    dir: impl AsRef<Path>,
    failures: &mut FailureRecorder,
) -> Result<Vec<ChallengeRecord>, LoadError> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match load_record_from_file(&path) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to read file {}: {}", path.display(), e);
                failures.append(FailureEntry::load(path.display().to_string(), e.to_string()));
            }
        }
    }

    tracing::info!(
        "Loaded {} records from {}",
        records.len(),
        dir.as_ref().display()
    );
    Ok(records)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
