use crate::decision::{Action, Decision, Reason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationStats {
    pub total_decisions: u64,
    pub blocked: u64,
    pub flagged: u64,
    pub allowed: u64,
    pub no_model: u64, // subset of flagged
    pub queued_for_labeling: u64,
    pub classifier_failures: u64,
    pub storage_failures: u64,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum StatEvent {
    Decided { action: Action, reason: Reason },
    QueuedForLabeling,
    ClassifierFailure,
    StorageFailure,
}

impl StatEvent {
    pub fn from_decision(decision: &Decision) -> Self {
        StatEvent::Decided {
            action: decision.action,
            reason: decision.reason,
        }
    }
}

/// Per-process moderation counters. Recording never fails.
pub struct StatisticsCollector {
    stats: Mutex<ModerationStats>,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            stats: Mutex::new(ModerationStats {
                total_decisions: 0,
                blocked: 0,
                flagged: 0,
                allowed: 0,
                no_model: 0,
                queued_for_labeling: 0,
                classifier_failures: 0,
                storage_failures: 0,
                start_time: now,
                last_updated: now,
            }),
        }
    }

    pub fn record_event(&self, event: StatEvent) {
        let mut stats = match self.stats.lock() {
            Ok(stats) => stats,
            Err(poisoned) => {
                log::warn!("Statistics lock poisoned, continuing with recovered state");
                poisoned.into_inner()
            }
        };
        stats.last_updated = Utc::now();

        match event {
            StatEvent::Decided { action, reason } => {
                stats.total_decisions += 1;
                match action {
                    Action::Block => stats.blocked += 1,
                    Action::Flag => stats.flagged += 1,
                    Action::Allow => stats.allowed += 1,
                }
                if reason == Reason::NoModel {
                    stats.no_model += 1;
                }
            }
            StatEvent::QueuedForLabeling => stats.queued_for_labeling += 1,
            StatEvent::ClassifierFailure => stats.classifier_failures += 1,
            StatEvent::StorageFailure => stats.storage_failures += 1,
        }
    }

    pub fn snapshot(&self) -> ModerationStats {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for StatisticsCollector {
    fn default() -> Self {
        Self::new()
    }
}
