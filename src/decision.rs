//! Decision Engine
//!
//! Maps a classifier probability onto block / flag / allow using the
//! configured thresholds. Evaluation is pure: recording the outcome is
//! the moderator's job.

use crate::classifier::Classifier;
use crate::config::ThresholdConfig;
use crate::error::ClassifierError;
use crate::normalization::TextNormalizer;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Block,
    Flag,
    Allow,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Block => "block",
            Action::Flag => "flag",
            Action::Allow => "allow",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    #[serde(rename = "no_model")]
    NoModel,
    #[serde(rename = "model:high_confidence")]
    HighConfidence,
    #[serde(rename = "model:medium_confidence")]
    MediumConfidence,
    #[serde(rename = "model:low_confidence")]
    LowConfidence,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::NoModel => "no_model",
            Reason::HighConfidence => "model:high_confidence",
            Reason::MediumConfidence => "model:medium_confidence",
            Reason::LowConfidence => "model:low_confidence",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comment submitted for moderation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationRequest {
    pub text: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
}

impl ModerationRequest {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            user_id: None,
            comment_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn with_comment_id(mut self, comment_id: &str) -> Self {
        self.comment_id = Some(comment_id.to_string());
        self
    }

    /// Metadata recorded next to the decision. Missing ids are kept as `null`.
    pub fn metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("user_id", self.user_id.as_deref());
        meta.insert("comment_id", self.comment_id.as_deref());
        meta
    }
}

/// Free-form key/value context persisted with every log row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Option<String>>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: Option<&str>) {
        self.0.insert(key.to_string(), value.map(str::to_string));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_deref())
    }

    /// Compact JSON object, keys sorted.
    pub fn to_json(&self) -> String {
        // A map of strings always serializes
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Outcome of moderating one comment. Written once to the audit log and
/// at most once to the retraining queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub score: Option<f64>,
    pub action: Action,
    pub reason: Reason,
}

impl Decision {
    /// RFC 3339 UTC timestamp with microsecond precision.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

pub struct DecisionEngine {
    thresholds: ThresholdConfig,
    normalizer: TextNormalizer,
}

impl DecisionEngine {
    pub fn new(thresholds: ThresholdConfig) -> anyhow::Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            normalizer: TextNormalizer::new(),
        })
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Decide on `text`. Without a classifier the comment is flagged for
    /// manual review rather than allowed or blocked.
    pub fn evaluate(
        &self,
        text: &str,
        classifier: Option<&dyn Classifier>,
    ) -> Result<Decision, ClassifierError> {
        let timestamp = Utc::now();

        let Some(classifier) = classifier else {
            return Ok(Decision {
                timestamp,
                text: text.to_string(),
                score: None,
                action: Action::Flag,
                reason: Reason::NoModel,
            });
        };

        let normalized = self.normalizer.normalize_str(text);
        let score = crate::classifier::check_probability(classifier.score(&normalized)?)?;
        let (action, reason) = self.determine_action(score);

        log::debug!(
            "{} scored {:.4} by '{}': {} ({})",
            truncate(text, 60),
            score,
            classifier.name(),
            action,
            reason
        );

        Ok(Decision {
            timestamp,
            text: text.to_string(),
            score: Some(score),
            action,
            reason,
        })
    }

    /// Determine action based on score thresholds
    pub fn determine_action(&self, score: f64) -> (Action, Reason) {
        if score >= self.thresholds.block {
            (Action::Block, Reason::HighConfidence)
        } else if score >= self.thresholds.flag {
            (Action::Flag, Reason::MediumConfidence)
        } else {
            (Action::Allow, Reason::LowConfidence)
        }
    }

    /// Whether the decision should be queued for human labeling.
    pub fn needs_label(&self, decision: &Decision) -> bool {
        decision
            .score
            .is_some_and(|score| self.thresholds.in_borderline_band(score))
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            normalizer: TextNormalizer::new(),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        format!("{text:?}")
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head:?}...")
    }
}
