//! Append-only audit log of analysis results
//!
//! Every successful prediction is recorded as one JSON line of
//! `(analysis_id, content, risk_level, confidence, timestamp, source)`.
//! The log is write-only from this process and strictly best-effort: a
//! failed write is logged and swallowed, it can never affect a prediction.

use crate::types::label::RiskLabel;
use crate::types::prediction::Prediction;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// One analysis result as persisted for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Unique record identifier
    pub analysis_id: String,
    /// The cleaned text that was analyzed
    pub content: String,
    /// Predicted risk tier
    pub risk_level: RiskLabel,
    /// Ensemble confidence in [0, 1]
    pub confidence: f32,
    /// Record creation time
    pub timestamp: DateTime<Utc>,
    /// Where the analysis request came from
    pub source: String,
}

impl AnalysisRecord {
    pub fn new(content: impl Into<String>, prediction: &Prediction, source: impl Into<String>) -> Self {
        Self {
            analysis_id: Uuid::new_v4().to_string(),
            content: content.into(),
            risk_level: prediction.label,
            confidence: prediction.confidence,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}

/// JSON-lines appender for analysis records.
pub struct AnalysisLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl AnalysisLogger {
    /// Open (or create) the log file for appending, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context(format!("failed to create audit directory {:?}", parent))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("failed to open audit log {:?}", path))?;

        debug!(path = %path.display(), "analysis log opened");
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort append. Failures are logged and swallowed.
    pub fn log(&self, record: &AnalysisRecord) {
        if let Err(e) = self.try_log(record) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to write analysis record"
            );
        }
    }

    fn try_log(&self, record: &AnalysisRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("lock error: {}", e))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis_log.jsonl");
        let logger = AnalysisLogger::open(&path).unwrap();

        let prediction = Prediction {
            label: RiskLabel::Moderate,
            confidence: 0.71,
        };
        logger.log(&AnalysisRecord::new("first post", &prediction, "test"));
        logger.log(&AnalysisRecord::new("second post", &prediction, "test"));

        let contents = std::fs::read_to_string(&path).unwrap();
        let records: Vec<AnalysisRecord> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "first post");
        assert_eq!(records[0].risk_level, RiskLabel::Moderate);
        assert_eq!(records[1].content, "second post");
        assert_ne!(records[0].analysis_id, records[1].analysis_id);
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/analysis_log.jsonl");
        let logger = AnalysisLogger::open(&path).unwrap();

        logger.log(&AnalysisRecord::new(
            "a post",
            &Prediction {
                label: RiskLabel::Low,
                confidence: 0.9,
            },
            "test",
        ));

        assert!(path.exists());
    }
}
