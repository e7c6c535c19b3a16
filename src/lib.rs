pub mod classifier;
pub mod config;
pub mod decision;
pub mod error;
pub mod moderator;
pub mod normalization;
pub mod service;
pub mod sinks;
pub mod statistics;

pub use classifier::{load_classifier, Classifier, LinearModel};
pub use config::{Config, ThresholdConfig};
pub use decision::{Action, Decision, DecisionEngine, Metadata, ModerationRequest, Reason};
pub use error::{ClassifierError, ModerationError, StorageError};
pub use moderator::Moderator;
pub use normalization::{normalize, TextNormalizer};
pub use sinks::{AuditLog, DecisionSink, MemorySink, RetrainingQueue};
pub use statistics::{ModerationStats, StatEvent, StatisticsCollector};
