//! Failure capture for offline triage

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A single failure encountered during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureEntry {
    /// A corpus item could not be read or parsed
    LoadFailure {
        #[serde(rename = "file")]
        source: String,
        error: String,
    },
    /// A backend call failed and the pair was abandoned
    RequestFailure {
        model: String,
        /// Working description at the time of failure, including any re-prompt suffixes
        description: String,
        error: String,
    },
}

impl FailureEntry {
    pub fn load(source: impl Into<String>, error: impl Into<String>) -> Self {
        FailureEntry::LoadFailure {
            source: source.into(),
            error: error.into(),
        }
    }

    pub fn request(
        model: impl Into<String>,
        description: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        FailureEntry::RequestFailure {
            model: model.into(),
            description: description.into(),
            error: error.into(),
        }
    }
}

/// Append-only, ordered log of failures
#[derive(Debug, Clone, Default)]
pub struct FailureRecorder {
    entries: Vec<FailureEntry>,
}

impl FailureRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: FailureEntry) {
        self.entries.push(entry);
    }

    /// Entries in encounter order
    pub fn entries(&self) -> &[FailureEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize every entry as a single JSON array. An empty recorder yields `[]`.
    pub fn flush_to<W: Write>(&self, mut sink: W) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut sink, &self.entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        sink.flush()
    }

    /// Write the failure artifact to a file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.flush_to(std::io::BufWriter::new(file))
    }
}
