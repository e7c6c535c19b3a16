use super::{score_field, CsvFile, DecisionSink};
use crate::decision::{Decision, Metadata};
use crate::error::StorageError;
use std::path::{Path, PathBuf};

pub const RETRAINING_HEADER: &[&str] = &["timestamp", "text", "score", "meta", "label"];

/// Borderline comments awaiting a human label. The label column is always
/// written empty and filled in by annotators later.
pub struct RetrainingQueue {
    file: CsvFile,
}

impl RetrainingQueue {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Ok(Self {
            file: CsvFile::open(path, RETRAINING_HEADER)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl DecisionSink for RetrainingQueue {
    fn append(&self, decision: &Decision, meta: &Metadata) -> Result<(), StorageError> {
        let timestamp = decision.timestamp_string();
        let score = score_field(decision.score);
        let meta = meta.to_json();
        self.file.append_row(&[
            timestamp.as_str(),
            decision.text.as_str(),
            score.as_str(),
            meta.as_str(),
            "",
        ])
    }
}
