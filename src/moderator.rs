//! Wires the normalizer, classifier, decision engine and both sinks into
//! a single moderation call.

use crate::classifier::{load_classifier, Classifier};
use crate::config::Config;
use crate::decision::{Decision, DecisionEngine, Metadata, ModerationRequest};
use crate::error::{ClassifierError, ModerationError, StorageError};
use crate::sinks::{AuditLog, DecisionSink, RetrainingQueue};
use crate::statistics::{StatEvent, StatisticsCollector};
use anyhow::Context;
use std::sync::Arc;

pub struct Moderator {
    engine: DecisionEngine,
    classifier: Option<Arc<dyn Classifier>>,
    audit: Arc<dyn DecisionSink>,
    retraining: Arc<dyn DecisionSink>,
    stats: Arc<StatisticsCollector>,
}

impl Moderator {
    pub fn new(
        engine: DecisionEngine,
        classifier: Option<Arc<dyn Classifier>>,
        audit: Arc<dyn DecisionSink>,
        retraining: Arc<dyn DecisionSink>,
    ) -> Self {
        Self {
            engine,
            classifier,
            audit,
            retraining,
            stats: Arc::new(StatisticsCollector::new()),
        }
    }

    /// Build the file-backed moderator described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let engine = DecisionEngine::new(config.thresholds)?;
        let classifier = load_classifier(&config.storage.model_path)
            .context("Failed to load classifier")?;
        let audit = AuditLog::open(&config.storage.audit_log)
            .context("Failed to open audit log")?;
        let retraining = RetrainingQueue::open(&config.storage.retraining_queue)
            .context("Failed to open retraining queue")?;

        log::info!(
            "Audit log: {}, retraining queue: {}",
            audit.path().display(),
            retraining.path().display()
        );

        Ok(Self::new(
            engine,
            classifier,
            Arc::new(audit),
            Arc::new(retraining),
        ))
    }

    pub fn with_statistics(mut self, stats: Arc<StatisticsCollector>) -> Self {
        self.stats = stats;
        self
    }

    pub fn statistics(&self) -> &Arc<StatisticsCollector> {
        &self.stats
    }

    pub fn has_model(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Score and decide without recording anything.
    pub fn evaluate(&self, request: &ModerationRequest) -> Result<Decision, ClassifierError> {
        self.engine
            .evaluate(&request.text, self.classifier.as_deref())
            .inspect_err(|_| self.stats.record_event(StatEvent::ClassifierFailure))
    }

    /// Persist a decision: always to the audit log, then to the retraining
    /// queue when its score is borderline. A failed audit append stops
    /// before anything is queued. Once the audit row is written the
    /// decision counts, even if queueing it afterwards fails.
    pub fn record(&self, decision: &Decision, meta: &Metadata) -> Result<(), StorageError> {
        self.audit
            .append(decision, meta)
            .inspect_err(|_| self.stats.record_event(StatEvent::StorageFailure))?;
        self.stats.record_event(StatEvent::from_decision(decision));

        if self.engine.needs_label(decision) {
            self.retraining
                .append(decision, meta)
                .inspect_err(|_| self.stats.record_event(StatEvent::StorageFailure))?;
            self.stats.record_event(StatEvent::QueuedForLabeling);
            log::debug!(
                "Queued comment with score {:?} for labeling",
                decision.score
            );
        }
        Ok(())
    }

    pub fn moderate(&self, request: &ModerationRequest) -> Result<Decision, ModerationError> {
        let decision = self.evaluate(request)?;
        self.record(&decision, &request.metadata())?;
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Action, Reason};
    use crate::sinks::MemorySink;

    struct FixedScore(f64);

    impl Classifier for FixedScore {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, _normalized: &str) -> Result<f64, ClassifierError> {
            Ok(self.0)
        }
    }

    struct Timeout;

    impl Classifier for Timeout {
        fn name(&self) -> &str {
            "timeout"
        }

        fn score(&self, _normalized: &str) -> Result<f64, ClassifierError> {
            Err(ClassifierError::Timeout(std::time::Duration::from_millis(5)))
        }
    }

    struct BrokenSink;

    impl DecisionSink for BrokenSink {
        fn append(&self, _decision: &Decision, _meta: &Metadata) -> Result<(), StorageError> {
            Err(StorageError::Append {
                path: "broken.csv".into(),
                source: std::io::Error::other("disk full"),
            })
        }
    }

    fn moderator_with(
        classifier: Option<Arc<dyn Classifier>>,
    ) -> (Moderator, Arc<MemorySink>, Arc<MemorySink>) {
        let audit = Arc::new(MemorySink::new());
        let retraining = Arc::new(MemorySink::new());
        let moderator = Moderator::new(
            DecisionEngine::default(),
            classifier,
            audit.clone(),
            retraining.clone(),
        );
        (moderator, audit, retraining)
    }

    fn fixed(score: f64) -> Option<Arc<dyn Classifier>> {
        Some(Arc::new(FixedScore(score)))
    }

    #[test]
    fn test_high_score_blocks_without_queueing() {
        let (moderator, audit, retraining) = moderator_with(fixed(0.9));
        let decision = moderator
            .moderate(&ModerationRequest::new("Fr33 $tuff @!!"))
            .unwrap();

        assert_eq!(decision.action, Action::Block);
        assert_eq!(decision.reason, Reason::HighConfidence);
        assert_eq!(audit.len(), 1);
        assert_eq!(retraining.len(), 0);
    }

    #[test]
    fn test_medium_score_flags_and_queues() {
        let (moderator, audit, retraining) = moderator_with(fixed(0.6));
        let request = ModerationRequest::new("Fr33 $tuff @!!")
            .with_user_id("u7")
            .with_comment_id("c3");
        let decision = moderator.moderate(&request).unwrap();

        assert_eq!(decision.action, Action::Flag);
        assert_eq!(decision.reason, Reason::MediumConfidence);
        assert_eq!(audit.len(), 1);
        assert_eq!(retraining.len(), 1);

        let (queued, meta) = &retraining.records()[0];
        assert_eq!(queued, &decision);
        assert_eq!(meta.get("user_id"), Some("u7"));
        assert_eq!(meta.get("comment_id"), Some("c3"));
    }

    #[test]
    fn test_low_score_allows_without_queueing() {
        let (moderator, audit, retraining) = moderator_with(fixed(0.2));
        let decision = moderator
            .moderate(&ModerationRequest::new("Fr33 $tuff @!!"))
            .unwrap();

        assert_eq!(decision.action, Action::Allow);
        assert_eq!(decision.reason, Reason::LowConfidence);
        assert_eq!(audit.len(), 1);
        assert_eq!(retraining.len(), 0);
    }

    #[test]
    fn test_near_miss_allow_is_queued() {
        let (moderator, _audit, retraining) = moderator_with(fixed(0.47));
        let decision = moderator.moderate(&ModerationRequest::new("meh")).unwrap();
        assert_eq!(decision.action, Action::Allow);
        assert_eq!(retraining.len(), 1);
    }

    #[test]
    fn test_no_model_flags_and_audits_only() {
        let (moderator, audit, retraining) = moderator_with(None);
        let decision = moderator
            .moderate(&ModerationRequest::new("whatever"))
            .unwrap();

        assert_eq!(decision.action, Action::Flag);
        assert_eq!(decision.reason, Reason::NoModel);
        assert_eq!(decision.score, None);
        assert_eq!(audit.len(), 1);
        assert_eq!(retraining.len(), 0);
        assert!(!moderator.has_model());
    }

    #[test]
    fn test_retraining_band_edges() {
        for (score, queued) in [
            (0.44, false),
            (0.45, true),
            (0.5, true),
            (0.79, true),
            (0.8, false),
            (1.0, false),
        ] {
            let (moderator, audit, retraining) = moderator_with(fixed(score));
            moderator.moderate(&ModerationRequest::new("x")).unwrap();
            assert_eq!(audit.len(), 1, "score {score}");
            assert_eq!(retraining.len(), usize::from(queued), "score {score}");
        }
    }

    #[test]
    fn test_audit_records_in_call_order() {
        let (moderator, audit, _retraining) = moderator_with(fixed(0.1));
        let texts = ["first", "second", "third", "fourth"];
        for text in texts {
            moderator.moderate(&ModerationRequest::new(text)).unwrap();
        }

        let logged: Vec<String> = audit.records().into_iter().map(|(d, _)| d.text).collect();
        assert_eq!(logged, texts);
    }

    #[test]
    fn test_classifier_error_logs_nothing() {
        let (moderator, audit, retraining) = moderator_with(Some(Arc::new(Timeout)));
        let err = moderator
            .moderate(&ModerationRequest::new("slow"))
            .unwrap_err();

        assert!(matches!(err, ModerationError::Classifier(ClassifierError::Timeout(_))));
        assert!(audit.is_empty());
        assert!(retraining.is_empty());
        assert_eq!(moderator.statistics().snapshot().classifier_failures, 1);
    }

    #[test]
    fn test_audit_failure_skips_retraining() {
        let retraining = Arc::new(MemorySink::new());
        let moderator = Moderator::new(
            DecisionEngine::default(),
            fixed(0.6),
            Arc::new(BrokenSink),
            retraining.clone(),
        );

        let err = moderator.moderate(&ModerationRequest::new("x")).unwrap_err();
        assert!(matches!(err, ModerationError::Storage(_)));
        assert!(retraining.is_empty());

        let stats = moderator.statistics().snapshot();
        assert_eq!(stats.storage_failures, 1);
        assert_eq!(stats.total_decisions, 0);
    }

    #[test]
    fn test_queue_failure_still_counts_audited_decision() {
        let audit = Arc::new(MemorySink::new());
        let moderator = Moderator::new(
            DecisionEngine::default(),
            fixed(0.6),
            audit.clone(),
            Arc::new(BrokenSink),
        );

        let err = moderator.moderate(&ModerationRequest::new("x")).unwrap_err();
        assert!(matches!(err, ModerationError::Storage(_)));
        assert_eq!(audit.len(), 1);

        let stats = moderator.statistics().snapshot();
        assert_eq!(stats.total_decisions, 1);
        assert_eq!(stats.flagged, 1);
        assert_eq!(stats.storage_failures, 1);
        assert_eq!(stats.queued_for_labeling, 0);
    }

    #[test]
    fn test_statistics_follow_decisions() {
        let (moderator, _audit, _retraining) = moderator_with(fixed(0.6));
        moderator.moderate(&ModerationRequest::new("a")).unwrap();
        moderator.moderate(&ModerationRequest::new("b")).unwrap();

        let stats = moderator.statistics().snapshot();
        assert_eq!(stats.total_decisions, 2);
        assert_eq!(stats.flagged, 2);
        assert_eq!(stats.queued_for_labeling, 2);
    }

    #[test]
    fn test_from_config_writes_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.model_path = dir.path().join("models/missing.json");
        config.storage.audit_log = dir.path().join("logs/moderation_log.csv");
        config.storage.retraining_queue = dir.path().join("logs/to_label.csv");

        let moderator = Moderator::from_config(&config).unwrap();
        assert!(!moderator.has_model());
        moderator
            .moderate(&ModerationRequest::new("hello, world"))
            .unwrap();

        let audit = std::fs::read_to_string(&config.storage.audit_log).unwrap();
        let rows: Vec<&str> = audit.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].contains(",\"hello, world\",,flag,no_model,"));
        assert!(!config.storage.retraining_queue.exists());
    }
}
