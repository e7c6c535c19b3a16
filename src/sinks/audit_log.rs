use super::{score_field, CsvFile, DecisionSink};
use crate::decision::{Decision, Metadata};
use crate::error::StorageError;
use std::path::{Path, PathBuf};

pub const AUDIT_HEADER: &[&str] = &["timestamp", "text", "score", "action", "reason", "meta"];

/// Every decision, in the order it was made.
pub struct AuditLog {
    file: CsvFile,
}

impl AuditLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Ok(Self {
            file: CsvFile::open(path, AUDIT_HEADER)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl DecisionSink for AuditLog {
    fn append(&self, decision: &Decision, meta: &Metadata) -> Result<(), StorageError> {
        let timestamp = decision.timestamp_string();
        let score = score_field(decision.score);
        let meta = meta.to_json();
        self.file.append_row(&[
            timestamp.as_str(),
            decision.text.as_str(),
            score.as_str(),
            decision.action.as_str(),
            decision.reason.as_str(),
            meta.as_str(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Action, ModerationRequest, Reason};
    use chrono::{TimeZone, Utc};

    fn decision(text: &str, score: Option<f64>, action: Action, reason: Reason) -> Decision {
        Decision {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
            text: text.to_string(),
            score,
            action,
            reason,
        }
    }

    #[test]
    fn test_rows_follow_header_layout() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("logs/moderation_log.csv")).unwrap();
        let meta = ModerationRequest::new("")
            .with_user_id("u1")
            .with_comment_id("c9")
            .metadata();

        log.append(
            &decision("Fr33 $tuff @!!", Some(0.9), Action::Block, Reason::HighConfidence),
            &meta,
        )
        .unwrap();
        log.append(&decision("hi, there", None, Action::Flag, Reason::NoModel), &Metadata::new())
            .unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.split("\r\n").collect();
        assert_eq!(lines[0], "timestamp,text,score,action,reason,meta");
        assert_eq!(
            lines[1],
            r#"2024-03-01T12:30:00.000000Z,Fr33 $tuff @!!,0.9,block,model:high_confidence,"{""comment_id"":""c9"",""user_id"":""u1""}""#
        );
        assert_eq!(
            lines[2],
            r#"2024-03-01T12:30:00.000000Z,"hi, there",,flag,no_model,{}"#
        );
        assert_eq!(lines.len(), 4);
    }
}
