//! Append-only destinations for decisions.
//!
//! The audit log receives every decision; the retraining queue only the
//! borderline ones. Both are injected into the moderator separately so
//! tests and embedders can swap in `MemorySink`.

mod audit_log;
mod csv_file;
mod memory;
mod retraining_queue;

pub use audit_log::AuditLog;
pub use csv_file::{column_values, parse_records, CsvFile};
pub use memory::MemorySink;
pub use retraining_queue::RetrainingQueue;

use crate::decision::{Decision, Metadata};
use crate::error::StorageError;

pub trait DecisionSink: Send + Sync {
    /// Append one record. Appends from concurrent callers are serialized
    /// and land in call order; existing records are never rewritten.
    fn append(&self, decision: &Decision, meta: &Metadata) -> Result<(), StorageError>;
}

/// Score column value: empty when the classifier was unavailable.
/// Whole numbers keep their fractional part (`1.0`, not `1`) so the
/// column always reads back as a float.
pub(crate) fn score_field(score: Option<f64>) -> String {
    score.map(|s| format!("{s:?}")).unwrap_or_default()
}
