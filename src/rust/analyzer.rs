use std::sync::Arc;

use log::{debug, error, warn};
use serde::Serialize;

use crate::backend::{KeywordSource, OnnxSource, ProbabilitySource};
use crate::config::{AnalyzerConfig, SharedConfig};
use crate::model_store::{Axis, ModelStore};
use crate::runtime::RuntimeConfig;
use crate::store::{FeedbackRecord, FeedbackSubmission, RecordId, RecordStore};
use crate::triage::{
    compose, decide_urgency_for_text, select_emotion, AnalysisResult, EscalationPolicy,
    ProbabilityVector, TriageError,
};

/// Longest accepted feedback text, in characters.
pub const MAX_TEXT_CHARS: usize = 2000;

/// Runs the full triage for one piece of feedback.
///
/// Holds the immutable configuration and one probability source per axis.
/// Every call takes its own configuration snapshot, so an `Analyzer` can be
/// shared across threads behind an `Arc` and reconfigured with
/// [`Analyzer::reload_config`] while requests are in flight.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use rukn::{Analyzer, AnalyzerConfig, CalibrationParameters, CrisisLexicon,
///            EmotionParameters, KeywordSource, LabelSet};
///
/// let urgency = LabelSet::new(["low", "medium", "high"])?;
/// let emotion = LabelSet::new(["neutral", "sadness"])?;
/// let config = AnalyzerConfig::new(
///     urgency.clone(),
///     CalibrationParameters::new(1.0, 0.6, "high")?,
///     emotion.clone(),
///     EmotionParameters::new(1.0)?,
///     CrisisLexicon::default(),
/// )?;
/// let analyzer = Analyzer::new(
///     config,
///     KeywordSource::urgency(urgency, "high")?,
///     KeywordSource::emotion(emotion)?,
/// );
///
/// let result = analyzer.analyze("أفكر في الانتحار")?;
/// assert_eq!(result.urgency_label, "high");
/// # Ok(())
/// # }
/// ```
pub struct Analyzer {
    config: Arc<SharedConfig>,
    urgency_source: Arc<dyn ProbabilitySource>,
    emotion_source: Arc<dyn ProbabilitySource>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Analyzer>();
    }
};

/// Static description of a running analyzer.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerInfo {
    pub status: &'static str,
    pub urgency_backend: String,
    pub emotion_backend: String,
    pub urgency_labels: Vec<String>,
    pub emotion_labels: Vec<String>,
    pub high_risk_label: String,
    pub decision_threshold: f64,
}

impl Analyzer {
    pub fn new(
        config: AnalyzerConfig,
        urgency_source: impl ProbabilitySource + 'static,
        emotion_source: impl ProbabilitySource + 'static,
    ) -> Self {
        Self::with_sources(config, Arc::new(urgency_source), Arc::new(emotion_source))
    }

    pub fn with_sources(
        config: AnalyzerConfig,
        urgency_source: Arc<dyn ProbabilitySource>,
        emotion_source: Arc<dyn ProbabilitySource>,
    ) -> Self {
        Self {
            config: Arc::new(SharedConfig::new(config)),
            urgency_source,
            emotion_source,
        }
    }

    /// Loads configuration and both ONNX models from a model store.
    pub fn from_store(store: &ModelStore, runtime_config: &RuntimeConfig) -> Result<Self, TriageError> {
        let config = AnalyzerConfig::load(store)?;
        let urgency = OnnxSource::from_store(
            store,
            Axis::Urgency,
            config.urgency_labels.len(),
            config.urgency.temperature,
            runtime_config,
        )?;
        let emotion = OnnxSource::from_store(
            store,
            Axis::Emotion,
            config.emotion_labels.len(),
            config.emotion.temperature,
            runtime_config,
        )?;
        Ok(Self::new(config, urgency, emotion))
    }

    /// Keyword-backed analyzer over the given configuration.
    pub fn keyword(config: AnalyzerConfig) -> Result<Self, TriageError> {
        let urgency = KeywordSource::urgency(
            config.urgency_labels.clone(),
            &config.urgency.high_risk_label,
        )?;
        let emotion = KeywordSource::emotion(config.emotion_labels.clone())?;
        Ok(Self::new(config, urgency, emotion))
    }

    pub fn config(&self) -> Arc<AnalyzerConfig> {
        self.config.snapshot()
    }

    /// Installs a new configuration for subsequent requests.
    ///
    /// The label sets must keep their sizes so the sources stay aligned.
    pub fn reload_config(&self, config: AnalyzerConfig) -> Result<(), TriageError> {
        let current = self.config.snapshot();
        if config.urgency_labels.len() != current.urgency_labels.len()
            || config.emotion_labels.len() != current.emotion_labels.len()
        {
            return Err(TriageError::Configuration(
                "Reloaded label sets must match the loaded models".into(),
            ));
        }
        self.config.swap(config);
        Ok(())
    }

    pub fn info(&self) -> AnalyzerInfo {
        let config = self.config.snapshot();
        AnalyzerInfo {
            status: "healthy",
            urgency_backend: self.urgency_source.name().to_string(),
            emotion_backend: self.emotion_source.name().to_string(),
            urgency_labels: config.urgency_labels.as_slice().to_vec(),
            emotion_labels: config.emotion_labels.as_slice().to_vec(),
            high_risk_label: config.urgency.high_risk_label.clone(),
            decision_threshold: config.urgency.decision_threshold,
        }
    }

    /// Validates and trims feedback text.
    ///
    /// # Errors
    /// `InvalidText` if the text is blank or longer than [`MAX_TEXT_CHARS`].
    pub fn validate_text(text: &str) -> Result<&str, TriageError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(TriageError::InvalidText("Text cannot be empty".into()));
        }
        let chars = trimmed.chars().count();
        if chars > MAX_TEXT_CHARS {
            return Err(TriageError::InvalidText(format!(
                "Text is too long ({} chars, max is {})",
                chars, MAX_TEXT_CHARS
            )));
        }
        Ok(trimmed)
    }

    /// Source output for one axis, checked against the label count before
    /// an uncalibrated source is re-tempered.
    fn calibrated(
        source: &dyn ProbabilitySource,
        text: &str,
        expected_len: usize,
        temperature: f32,
    ) -> Result<ProbabilityVector, TriageError> {
        let probs = source.probabilities(text).map_err(|e| {
            error!("{} backend failed: {}", source.name(), e);
            e
        })?;
        if source.is_calibrated() {
            return Ok(probs);
        }
        probs.validate(expected_len).map_err(|e| {
            error!("{} backend returned a malformed vector: {}", source.name(), e);
            e
        })?;
        probs.tempered(temperature)
    }

    /// Classifies one text into an [`AnalysisResult`].
    pub fn analyze(&self, text: &str) -> Result<AnalysisResult, TriageError> {
        let config = self.config.snapshot();
        self.analyze_with(text, &config)
    }

    fn analyze_with(&self, text: &str, config: &AnalyzerConfig) -> Result<AnalysisResult, TriageError> {
        let text = Self::validate_text(text)?;
        debug!("Analyzing feedback ({} chars)", text.chars().count());

        let urgency_probs = Self::calibrated(
            self.urgency_source.as_ref(),
            text,
            config.urgency_labels.len(),
            config.urgency.temperature,
        )?;
        let urgency = decide_urgency_for_text(
            text,
            &urgency_probs,
            &config.urgency_labels,
            &config.urgency,
            &config.lexicon,
        )?;
        if urgency.is_overridden() {
            warn!(
                "Crisis term detected; urgency forced to '{}' (model chose index {})",
                urgency.label, urgency.selected_index
            );
        }

        let emotion_probs = Self::calibrated(
            self.emotion_source.as_ref(),
            text,
            config.emotion_labels.len(),
            config.emotion.temperature,
        )?;
        let emotion = select_emotion(&emotion_probs, &config.emotion_labels)?;

        let result = compose(&urgency, &emotion);
        debug!(
            "urgency={} emotion={} reasons={:?}",
            result.urgency_label,
            result.emotion_label,
            result.reasons.as_slice()
        );
        Ok(result)
    }

    /// Analyzes a submission and persists it when the user consented.
    ///
    /// Returns the analysis and the stored record id, if any. The flag on the
    /// stored record uses the same configuration snapshot as the analysis.
    pub fn analyze_submission(
        &self,
        submission: &FeedbackSubmission,
        store: &dyn RecordStore,
    ) -> Result<(AnalysisResult, Option<RecordId>), TriageError> {
        let config = self.config.snapshot();
        let result = self.analyze_with(&submission.text, &config)?;
        if !submission.consent {
            return Ok((result, None));
        }
        let policy = EscalationPolicy::new(config.urgency.high_risk_label.clone());
        let record = FeedbackRecord::from_analysis(submission, &result, &policy);
        let id = store.insert(record).map_err(|e| {
            error!("Failed to persist feedback record: {}", e);
            e
        })?;
        Ok((result, Some(id)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;
    use crate::config::{CalibrationParameters, EmotionParameters, LabelSet};
    use crate::store::InMemoryRecordStore;
    use crate::triage::{CrisisLexicon, ReasonCode};

    struct Fixed(Vec<f32>);

    impl ProbabilitySource for Fixed {
        fn probabilities(&self, _text: &str) -> Result<ProbabilityVector, TriageError> {
            Ok(ProbabilityVector::new(self.0.clone()))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// Plain softmax output that still needs the configured temperature.
    struct Uncalibrated(Vec<f32>);

    impl ProbabilitySource for Uncalibrated {
        fn probabilities(&self, _text: &str) -> Result<ProbabilityVector, TriageError> {
            Ok(ProbabilityVector::new(self.0.clone()))
        }

        fn is_calibrated(&self) -> bool {
            false
        }

        fn name(&self) -> &str {
            "uncalibrated"
        }
    }

    /// Installs `next` into the analyzer's configuration mid-request.
    struct ReloadsDuringRequest {
        shared: OnceLock<Arc<SharedConfig>>,
        next: Mutex<Option<AnalyzerConfig>>,
        output: Vec<f32>,
    }

    impl ProbabilitySource for ReloadsDuringRequest {
        fn probabilities(&self, _text: &str) -> Result<ProbabilityVector, TriageError> {
            if let (Some(shared), Some(next)) = (self.shared.get(), self.next.lock().unwrap().take()) {
                shared.swap(next);
            }
            Ok(ProbabilityVector::new(self.output.clone()))
        }

        fn name(&self) -> &str {
            "reloading"
        }
    }

    fn config_with(temperature: f32, high_risk_label: &str) -> AnalyzerConfig {
        AnalyzerConfig::new(
            LabelSet::new(["low", "high", "medium"]).unwrap(),
            CalibrationParameters::new(temperature, 0.8, high_risk_label).unwrap(),
            LabelSet::new(["neutral", "sadness"]).unwrap(),
            EmotionParameters::new(temperature).unwrap(),
            CrisisLexicon::default(),
        )
        .unwrap()
    }

    fn config() -> AnalyzerConfig {
        config_with(1.0, "high")
    }

    #[test]
    fn test_text_validation() {
        assert!(matches!(Analyzer::validate_text("   "), Err(TriageError::InvalidText(_))));
        assert!(matches!(
            Analyzer::validate_text(&"ا".repeat(MAX_TEXT_CHARS + 1)),
            Err(TriageError::InvalidText(_))
        ));
        assert_eq!(Analyzer::validate_text("  مرحبا ").unwrap(), "مرحبا");
        assert!(Analyzer::validate_text(&"ا".repeat(MAX_TEXT_CHARS)).is_ok());
    }

    #[test]
    fn test_crisis_override_end_to_end() {
        let analyzer = Analyzer::new(config(), Fixed(vec![0.9, 0.05, 0.05]), Fixed(vec![0.2, 0.8]));
        let result = analyzer.analyze("أفكر في الانتحار").unwrap();
        assert_eq!(result.urgency_label, "high");
        assert_eq!(result.urgency_confidence, 0.9);
        assert_eq!(
            result.reasons.as_slice(),
            &[ReasonCode::CalibratedNonHigh, ReasonCode::CrisisOverride]
        );
        assert_eq!(result.emotion_label, "sadness");
    }

    #[test]
    fn test_malformed_backend_output_is_server_side() {
        let analyzer = Analyzer::new(config(), Fixed(vec![0.5, 0.6, 0.0]), Fixed(vec![0.2, 0.8]));
        let err = analyzer.analyze("hello").unwrap_err();
        assert!(matches!(err, TriageError::InvalidInput(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_uncalibrated_output_is_validated_before_tempering() {
        // [0.5, 0.6, 0.0] is in range but sums to 1.1
        let analyzer = Analyzer::new(
            config_with(1.5, "high"),
            Uncalibrated(vec![0.5, 0.6, 0.0]),
            Uncalibrated(vec![0.2, 0.8]),
        );
        let err = analyzer.analyze("hello").unwrap_err();
        assert!(matches!(err, TriageError::InvalidInput(_)));
        assert_eq!(err.status_code(), 500);

        let analyzer = Analyzer::new(
            config_with(1.5, "high"),
            Uncalibrated(vec![0.2, 0.7, 0.1]),
            Uncalibrated(vec![-0.3, 1.3]),
        );
        let err = analyzer.analyze("hello").unwrap_err();
        assert!(matches!(err, TriageError::InvalidInput(_)));
        assert_eq!(err.status_code(), 500);

        let analyzer = Analyzer::new(
            config_with(1.5, "high"),
            Uncalibrated(vec![0.2, 0.7, 0.1]),
            Uncalibrated(vec![0.2, 0.8]),
        );
        let result = analyzer.analyze("hello").unwrap();
        assert_eq!(result.urgency_label, "low");
        assert_eq!(result.emotion_label, "sadness");
    }

    #[test]
    fn test_submission_flag_uses_request_config() {
        let emotion = Arc::new(ReloadsDuringRequest {
            shared: OnceLock::new(),
            next: Mutex::new(Some(config_with(1.0, "low"))),
            output: vec![0.9, 0.1],
        });
        let analyzer = Analyzer::with_sources(
            config(),
            Arc::new(Fixed(vec![0.9, 0.05, 0.05])),
            emotion.clone(),
        );
        assert!(emotion.shared.set(Arc::clone(&analyzer.config)).is_ok());

        let store = InMemoryRecordStore::new();
        let submission = FeedbackSubmission::new("hello").with_consent(true);
        let (result, id) = analyzer.analyze_submission(&submission, &store).unwrap();
        assert_eq!(result.urgency_label, "low");
        assert!(id.is_some());
        assert!(!store.records()[0].is_flagged);

        // the reload landed, and only later requests see it
        assert_eq!(analyzer.config().urgency.high_risk_label, "low");
    }

    #[test]
    fn test_reload_rejects_resized_labels() {
        let analyzer = Analyzer::new(config(), Fixed(vec![0.1, 0.2, 0.7]), Fixed(vec![0.5, 0.5]));
        let resized = AnalyzerConfig::new(
            LabelSet::new(["low", "high"]).unwrap(),
            CalibrationParameters::new(1.0, 0.8, "high").unwrap(),
            LabelSet::new(["neutral", "sadness"]).unwrap(),
            EmotionParameters::new(1.0).unwrap(),
            CrisisLexicon::default(),
        )
        .unwrap();
        assert!(analyzer.reload_config(resized).is_err());

        let mut lenient = config();
        lenient.urgency.decision_threshold = 0.1;
        analyzer.reload_config(lenient).unwrap();
        assert_eq!(analyzer.analyze("hello").unwrap().urgency_label, "high");
    }
}
