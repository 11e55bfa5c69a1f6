use crate::config::LabelSet;
use crate::triage::{ProbabilityVector, TriageError};

use super::ProbabilitySource;

/// Logit added to a class for every keyword hit.
const HIT_BOOST: f32 = 2.0;

/// Keywords that push probability mass toward one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub label: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(label: impl Into<String>, keywords: Vec<impl Into<String>>) -> Self {
        Self {
            label: label.into(),
            keywords: keywords.into_iter().map(|k| k.into().to_lowercase()).collect(),
        }
    }
}

/// Deterministic stand-in for a trained model.
///
/// Every class starts at its baseline logit and gains [`HIT_BOOST`] per keyword
/// found in the lowercased text; the result is a plain (uncalibrated) softmax.
#[derive(Debug, Clone)]
pub struct KeywordSource {
    labels: LabelSet,
    baseline: Vec<f32>,
    rules: Vec<(usize, Vec<String>)>,
}

impl KeywordSource {
    /// # Errors
    /// `Configuration` if a rule names a label outside `labels` or has no keywords.
    pub fn new(labels: LabelSet, rules: Vec<KeywordRule>) -> Result<Self, TriageError> {
        let mut indexed = Vec::with_capacity(rules.len());
        for rule in rules {
            let index = labels.index_of(&rule.label).ok_or_else(|| {
                TriageError::Configuration(format!(
                    "Keyword rule targets unknown label '{}'",
                    rule.label
                ))
            })?;
            if rule.keywords.is_empty() || rule.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(TriageError::Configuration(format!(
                    "Keyword rule for '{}' needs non-empty keywords",
                    rule.label
                )));
            }
            indexed.push((index, rule.keywords));
        }
        Ok(Self {
            baseline: vec![0.0; labels.len()],
            labels,
            rules: indexed,
        })
    }

    /// Raises the starting logit of `label`, making it the answer for text with no hits.
    pub fn with_baseline(mut self, label: &str, logit: f32) -> Result<Self, TriageError> {
        let index = self.labels.index_of(label).ok_or_else(|| {
            TriageError::Configuration(format!("Baseline targets unknown label '{}'", label))
        })?;
        self.baseline[index] = logit;
        Ok(self)
    }

    /// Urgency rules: distress words lean toward the high-risk label, the rest to the first label.
    pub fn urgency(labels: LabelSet, high_risk_label: &str) -> Result<Self, TriageError> {
        let resting = labels
            .iter()
            .find(|l| *l != high_risk_label)
            .unwrap_or(high_risk_label)
            .to_string();
        let mut rules = vec![KeywordRule::new(
            high_risk_label,
            vec!["urgent", "help", "now", "عاجل", "ساعدوني", "الآن", "فورا"],
        )];
        if labels.contains("medium") && high_risk_label != "medium" {
            rules.push(KeywordRule::new(
                "medium",
                vec!["worried", "stress", "قلق", "ضغط", "أرق", "توتر"],
            ));
        }
        Self::new(labels, rules)?.with_baseline(&resting, 1.0)
    }

    /// Emotion rules for whichever of the common emotion names the label set carries.
    pub fn emotion(labels: LabelSet) -> Result<Self, TriageError> {
        let candidates = [
            ("sadness", vec!["sad", "upset", "حزين", "حزن", "مكتئب"]),
            ("anger", vec!["angry", "furious", "غاضب", "غضب", "عصبي"]),
            ("fear", vec!["afraid", "scared", "خائف", "خوف", "قلق"]),
            ("joy", vec!["happy", "glad", "سعيد", "فرح", "مرتاح"]),
        ];
        let rules = candidates
            .into_iter()
            .filter(|(label, _)| labels.contains(label))
            .map(|(label, keywords)| KeywordRule::new(label, keywords))
            .collect();
        let source = Self::new(labels, rules)?;
        if source.labels.contains("neutral") {
            source.with_baseline("neutral", 1.0)
        } else {
            Ok(source)
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }
}

impl ProbabilitySource for KeywordSource {
    fn probabilities(&self, text: &str) -> Result<ProbabilityVector, TriageError> {
        let folded = text.to_lowercase();
        let mut logits = self.baseline.clone();
        for (index, keywords) in &self.rules {
            let hits = keywords.iter().filter(|k| folded.contains(k.as_str())).count();
            logits[*index] += HIT_BOOST * hits as f32;
        }
        ProbabilityVector::from_logits(&logits, 1.0)
    }

    fn is_calibrated(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
