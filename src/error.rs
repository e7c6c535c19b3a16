use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures of the scoring capability.
///
/// A missing model is not represented here: that is a defined state
/// (`Option::None` classifier) which yields a `no_model` decision.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact {path} is malformed: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("classifier returned an invalid probability: {0}")]
    InvalidScore(f64),

    #[error("classifier did not respond within {0:?}")]
    Timeout(Duration),

    #[error("scoring task failed: {0}")]
    Task(String),
}

/// Failures of the append-only decision logs.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to prepare log location {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append to {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writer lock for {0} was poisoned")]
    Poisoned(PathBuf),
}

/// Everything `Moderator::moderate` can fail with.
#[derive(Debug, Error)]
pub enum ModerationError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
