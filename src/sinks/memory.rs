use super::DecisionSink;
use crate::decision::{Decision, Metadata};
use crate::error::StorageError;
use std::sync::Mutex;

/// In-process sink keeping every record in call order.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Decision, Metadata)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(Decision, Metadata)> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DecisionSink for MemorySink {
    fn append(&self, decision: &Decision, meta: &Metadata) -> Result<(), StorageError> {
        self.records
            .lock()
            .map_err(|_| StorageError::Poisoned("memory".into()))?
            .push((decision.clone(), meta.clone()));
        Ok(())
    }
}
