use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::TriageError;
use super::lexicon::CrisisLexicon;
use super::probability::ProbabilityVector;
use super::utils::argmax_excluding;
use crate::config::{CalibrationParameters, LabelSet};

/// Machine-readable code recording which rule fired during a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The high-risk probability met the decision threshold
    CalibratedHigh,
    /// The high-risk probability fell short; argmax over the other classes
    CalibratedNonHigh,
    /// A crisis term forced the high-risk label
    CrisisOverride,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CalibratedHigh => "calibrated_high",
            Self::CalibratedNonHigh => "calibrated_non_high",
            Self::CrisisOverride => "crisis_override",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only, ordered list of reason codes for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionTrace(Vec<ReasonCode>);

impl DecisionTrace {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, reason: ReasonCode) {
        self.0.push(reason);
    }

    pub fn contains(&self, reason: ReasonCode) -> bool {
        self.0.contains(&reason)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReasonCode> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ReasonCode] {
        &self.0
    }
}

impl FromIterator<ReasonCode> for DecisionTrace {
    fn from_iter<T: IntoIterator<Item = ReasonCode>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of the calibrated urgency decision.
#[derive(Debug, Clone, PartialEq)]
pub struct UrgencyDecision {
    pub label: String,
    /// Index the calibration rule selected; unchanged by a crisis override.
    pub selected_index: usize,
    /// Probability mass at `selected_index`, full precision.
    pub confidence: f32,
    pub high_risk_index: usize,
    pub trace: DecisionTrace,
}

impl UrgencyDecision {
    /// Forces the high-risk label and records `crisis_override`.
    ///
    /// Confidence stays the model's probability for the class the calibration
    /// rule picked, even when that no longer matches the label. Applying the
    /// override twice leaves the decision as it was after the first time.
    pub fn with_crisis_override(mut self, labels: &LabelSet) -> Self {
        if self.trace.contains(ReasonCode::CrisisOverride) {
            return self;
        }
        if let Some(label) = labels.get(self.high_risk_index) {
            self.label = label.to_string();
        }
        self.trace.push(ReasonCode::CrisisOverride);
        self
    }

    pub fn is_overridden(&self) -> bool {
        self.trace.contains(ReasonCode::CrisisOverride)
    }
}

/// Thresholded argmax with a reserved high-risk class.
///
/// Probabilities are expected to be calibrated already (temperature applied
/// upstream); `params.temperature` is not consulted here.
///
/// 1. The high-risk index is the position of `params.high_risk_label`, or 0 if absent.
/// 2. If its probability is at least `params.decision_threshold` it wins (`calibrated_high`).
/// 3. Otherwise the argmax over the remaining classes wins, ties to the lowest
///    index (`calibrated_non_high`). A single-class label set has no remaining
///    classes and falls back to the high-risk index.
///
/// # Errors
/// `InvalidInput` if the label set is empty or the vector is malformed for it.
pub fn decide_urgency(
    probs: &ProbabilityVector,
    labels: &LabelSet,
    params: &CalibrationParameters,
) -> Result<UrgencyDecision, TriageError> {
    probs.validate(labels.len())?;

    let high_risk_index = labels.index_of(&params.high_risk_label).unwrap_or(0);
    let values = probs.as_array();
    let p_high = values[high_risk_index];

    let mut trace = DecisionTrace::new();
    let selected_index = if f64::from(p_high) >= params.decision_threshold {
        trace.push(ReasonCode::CalibratedHigh);
        high_risk_index
    } else {
        trace.push(ReasonCode::CalibratedNonHigh);
        argmax_excluding(values, Some(high_risk_index)).unwrap_or(high_risk_index)
    };

    let label = labels
        .get(selected_index)
        .ok_or_else(|| TriageError::InvalidInput(format!("No label at index {}", selected_index)))?
        .to_string();

    Ok(UrgencyDecision {
        label,
        selected_index,
        confidence: values[selected_index],
        high_risk_index,
        trace,
    })
}

/// [`decide_urgency`] followed by the crisis-lexicon check on the raw text.
pub fn decide_urgency_for_text(
    text: &str,
    probs: &ProbabilityVector,
    labels: &LabelSet,
    params: &CalibrationParameters,
    lexicon: &CrisisLexicon,
) -> Result<UrgencyDecision, TriageError> {
    let decision = decide_urgency(probs, labels, params)?;
    if lexicon.detect(text) {
        Ok(decision.with_crisis_override(labels))
    } else {
        Ok(decision)
    }
}
