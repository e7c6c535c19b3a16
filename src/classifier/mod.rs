//! Scoring capability consumed by the decision engine.
//!
//! The engine only needs a probability in `[0, 1]` for a normalized
//! comment. How the model was trained is not its concern.

pub mod linear;

pub use linear::{LinearModel, TermWeight};

use crate::error::ClassifierError;
use std::path::Path;
use std::sync::Arc;

/// A loaded, read-only toxicity model.
///
/// Implementations are shared across request handlers, so `score` takes
/// `&self` and must not mutate the model.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Probability that `normalized` is toxic.
    fn score(&self, normalized: &str) -> Result<f64, ClassifierError>;
}

/// Load the model artifact at `path`.
///
/// A missing artifact is not an error: it returns `Ok(None)` and the
/// engine falls back to flagging everything for manual review.
pub fn load_classifier(path: &Path) -> Result<Option<Arc<dyn Classifier>>, ClassifierError> {
    if !path.exists() {
        log::warn!(
            "No model artifact at {}, every comment will be flagged for review",
            path.display()
        );
        return Ok(None);
    }

    let model = LinearModel::load(path)?;
    log::info!(
        "Loaded model '{}' ({} terms) from {}",
        model.name(),
        model.vocabulary_len(),
        path.display()
    );
    Ok(Some(Arc::new(model)))
}

/// Reject anything that is not a finite probability.
pub(crate) fn check_probability(value: f64) -> Result<f64, ClassifierError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ClassifierError::InvalidScore(value))
    }
}
