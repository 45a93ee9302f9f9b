//! JSONL file writer for guard decision records.
//!
//! Each [`DecisionRecord`] becomes a single JSON line carrying a `type`
//! field and an RFC 3339 `timestamp`. The file is opened in append mode so
//! one log can collect many runs.

use super::{flatten_record, timestamp_now};
use aura_application::ports::decision_log::{DecisionLogger, DecisionRecord};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Decision logger that appends one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes after every record and
/// on `Drop`.
pub struct JsonlDecisionLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlDecisionLogger {
    /// Open (or create) the log at the given path.
    ///
    /// Creates parent directories if needed. Returns `None` if the file
    /// cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create decision log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open decision log {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DecisionLogger for JsonlDecisionLogger {
    fn log(&self, record: DecisionRecord) {
        let line = flatten_record(record, Some(timestamp_now()));
        let Ok(line) = serde_json::to_string(&line) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
                warn!("Failed to write decision log {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for JsonlDecisionLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_jsonl_logger_writes_valid_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.jsonl");
        let logger = JsonlDecisionLogger::new(&path).unwrap();

        logger.log(DecisionRecord::new(
            "decision",
            json!({"tool": "refund", "reason": "duplicate_side_effect", "seq": 2}),
        ));
        logger.log(DecisionRecord::new(
            "outcome",
            json!({"tool": "refund", "status": "success"}),
        ));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert!(line.get("type").is_some());
            assert!(line["timestamp"].as_str().unwrap().ends_with('Z'));
        }
        assert_eq!(lines[0]["type"], "decision");
        assert_eq!(lines[0]["reason"], "duplicate_side_effect");
        assert_eq!(lines[0]["seq"], 2);
        assert_eq!(lines[1]["type"], "outcome");
    }

    #[test]
    fn test_jsonl_logger_handles_non_object_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scalar.jsonl");
        let logger = JsonlDecisionLogger::new(&path).unwrap();

        logger.log(DecisionRecord::new("note", json!("just a string")));
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines[0]["type"], "note");
        assert_eq!(lines[0]["data"], "just a string");
    }

    #[test]
    fn test_jsonl_logger_appends_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("decisions.jsonl");

        for run in ["run-a", "run-b"] {
            let logger = JsonlDecisionLogger::new(&path).unwrap();
            logger.log(DecisionRecord::new("run_started", json!({ "run_id": run })));
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["run_id"], "run-a");
        assert_eq!(lines[1]["run_id"], "run-b");
    }

    #[test]
    fn test_jsonl_logger_returns_none_when_parent_is_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().join("decisions.jsonl");
        assert!(JsonlDecisionLogger::new(&path).is_none());
    }
}
