use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::model_store::{Axis, ModelStore};
use crate::triage::{CrisisLexicon, TriageError};

/// Label used for the high-risk class when metadata does not name one.
pub const DEFAULT_HIGH_RISK_LABEL: &str = "high";

/// Ordered, unique class names defining the index-to-label mapping of a probability vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    /// # Errors
    /// `Configuration` if the set is empty, a label is blank, or a label repeats.
    pub fn new<I, S>(labels: I) -> Result<Self, TriageError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(TriageError::Configuration("Label set cannot be empty".into()));
        }
        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(TriageError::Configuration(format!("Label {} cannot be empty", i + 1)));
            }
            if labels[..i].contains(label) {
                return Err(TriageError::Configuration(format!("Duplicate label '{}'", label)));
            }
        }
        Ok(Self(labels))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.0.iter().position(|l| l == label)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Urgency-axis calibration: temperature, decision threshold and reserved high-risk class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationParameters {
    pub temperature: f32,
    /// Kept at double precision; probabilities are widened before comparison.
    pub decision_threshold: f64,
    pub high_risk_label: String,
}

impl CalibrationParameters {
    /// # Errors
    /// `Configuration` if the temperature is not finite and positive or the
    /// threshold is outside `[0, 1]`.
    pub fn new(
        temperature: f32,
        decision_threshold: f64,
        high_risk_label: impl Into<String>,
    ) -> Result<Self, TriageError> {
        validate_temperature(temperature)?;
        if !(0.0..=1.0).contains(&decision_threshold) {
            return Err(TriageError::Configuration(format!(
                "Decision threshold must be in [0, 1], got {}",
                decision_threshold
            )));
        }
        Ok(Self {
            temperature,
            decision_threshold,
            high_risk_label: high_risk_label.into(),
        })
    }

    /// Builds parameters whose high-risk label is guaranteed to be reachable in `labels`.
    ///
    /// An explicitly configured label must exist. Without one, `"high"` is
    /// used when present and the first label otherwise.
    pub fn for_labels(
        labels: &LabelSet,
        temperature: f32,
        decision_threshold: f64,
        high_risk_label: Option<&str>,
    ) -> Result<Self, TriageError> {
        let label = match high_risk_label {
            Some(label) if labels.contains(label) => label.to_string(),
            Some(label) => {
                return Err(TriageError::Configuration(format!(
                    "High-risk label '{}' is not one of {:?}",
                    label,
                    labels.as_slice()
                )))
            }
            None if labels.contains(DEFAULT_HIGH_RISK_LABEL) => DEFAULT_HIGH_RISK_LABEL.to_string(),
            None => {
                let first = labels.get(0).unwrap_or_default().to_string();
                warn!(
                    "No '{}' urgency label; treating '{}' as the high-risk class",
                    DEFAULT_HIGH_RISK_LABEL, first
                );
                first
            }
        };
        Self::new(temperature, decision_threshold, label)
    }
}

/// Emotion-axis calibration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionParameters {
    pub temperature: f32,
}

impl EmotionParameters {
    pub fn new(temperature: f32) -> Result<Self, TriageError> {
        validate_temperature(temperature)?;
        Ok(Self { temperature })
    }
}

fn validate_temperature(temperature: f32) -> Result<(), TriageError> {
    if temperature.is_finite() && temperature > 0.0 {
        Ok(())
    } else {
        Err(TriageError::Configuration(format!(
            "Temperature must be finite and > 0, got {}",
            temperature
        )))
    }
}

/// `urgency_model/inference_meta.json`
#[derive(Debug, Clone, Deserialize)]
pub struct UrgencyMeta {
    pub urgency_labels: Vec<String>,
    pub temperature: f32,
    pub tau_high: f64,
    #[serde(default)]
    pub high_risk_label: Option<String>,
    #[serde(default)]
    pub sha256: BTreeMap<String, String>,
}

/// `emotion_model/emotion_meta.json`
#[derive(Debug, Clone, Deserialize)]
pub struct EmotionMeta {
    pub emotion_labels: Vec<String>,
    pub temperature: f32,
    #[serde(default)]
    pub sha256: BTreeMap<String, String>,
}

/// Immutable process-wide configuration for both axes and the crisis lexicon.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub urgency_labels: LabelSet,
    pub urgency: CalibrationParameters,
    pub emotion_labels: LabelSet,
    pub emotion: EmotionParameters,
    pub lexicon: CrisisLexicon,
}

impl AnalyzerConfig {
    pub fn new(
        urgency_labels: LabelSet,
        urgency: CalibrationParameters,
        emotion_labels: LabelSet,
        emotion: EmotionParameters,
        lexicon: CrisisLexicon,
    ) -> Result<Self, TriageError> {
        if !urgency_labels.contains(&urgency.high_risk_label) {
            return Err(TriageError::Configuration(format!(
                "High-risk label '{}' is not one of {:?}",
                urgency.high_risk_label,
                urgency_labels.as_slice()
            )));
        }
        Ok(Self {
            urgency_labels,
            urgency,
            emotion_labels,
            emotion,
            lexicon,
        })
    }

    /// Builds the configuration from already-parsed metadata.
    pub fn from_meta(urgency: UrgencyMeta, emotion: EmotionMeta) -> Result<Self, TriageError> {
        let urgency_labels = LabelSet::new(urgency.urgency_labels)?;
        let calibration = CalibrationParameters::for_labels(
            &urgency_labels,
            urgency.temperature,
            urgency.tau_high,
            urgency.high_risk_label.as_deref(),
        )?;
        let emotion_labels = LabelSet::new(emotion.emotion_labels)?;
        let emotion_params = EmotionParameters::new(emotion.temperature)?;
        Self::new(
            urgency_labels,
            calibration,
            emotion_labels,
            emotion_params,
            CrisisLexicon::default(),
        )
    }

    /// Loads both metadata files from a model store, verifying any listed checksums.
    pub fn load(store: &ModelStore) -> Result<Self, TriageError> {
        let urgency: UrgencyMeta = read_json(&store.meta_path(Axis::Urgency))?;
        store.verify_checksums(Axis::Urgency, &urgency.sha256)?;
        let emotion: EmotionMeta = read_json(&store.meta_path(Axis::Emotion))?;
        store.verify_checksums(Axis::Emotion, &emotion.sha256)?;

        let config = Self::from_meta(urgency, emotion)?;
        info!(
            "Urgency labels: {:?} (temperature {}, tau_high {}, high-risk '{}')",
            config.urgency_labels.as_slice(),
            config.urgency.temperature,
            config.urgency.decision_threshold,
            config.urgency.high_risk_label
        );
        info!(
            "Emotion labels: {:?} (temperature {})",
            config.emotion_labels.as_slice(),
            config.emotion.temperature
        );
        Ok(config)
    }

    /// Replaces the crisis lexicon, typically to append deployment-specific terms.
    pub fn with_lexicon(mut self, lexicon: CrisisLexicon) -> Self {
        self.lexicon = lexicon;
        self
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, TriageError> {
    let bytes = fs::read(path).map_err(|e| {
        TriageError::Configuration(format!("Failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        TriageError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Read-mostly handle to the active configuration.
///
/// Readers take an `Arc` snapshot per request; a reload swaps the whole
/// configuration and never mutates one in place.
#[derive(Debug)]
pub struct SharedConfig {
    current: RwLock<Arc<AnalyzerConfig>>,
}

impl SharedConfig {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<AnalyzerConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Installs `config` and returns the one it replaced.
    pub fn swap(&self, config: AnalyzerConfig) -> Arc<AnalyzerConfig> {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, Arc::new(config))
    }
}
