use serde::{Deserialize, Serialize, Serializer};

use super::decision::{DecisionTrace, UrgencyDecision};
use super::emotion::EmotionSelection;
use super::utils::round_4dp;

/// Final triage output for one piece of feedback.
///
/// Confidences are kept at full precision; serialization rounds them to four
/// decimal places, giving the wire shape
/// `{"urgency", "confidence", "emotion", "emotion_confidence", "reasons"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "urgency")]
    pub urgency_label: String,
    #[serde(rename = "confidence", serialize_with = "serialize_rounded")]
    pub urgency_confidence: f32,
    #[serde(rename = "emotion")]
    pub emotion_label: String,
    #[serde(serialize_with = "serialize_rounded")]
    pub emotion_confidence: f32,
    pub reasons: DecisionTrace,
}

/// Writes a confidence rounded to 4 decimal places.
pub(crate) fn serialize_rounded<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f32(round_4dp(*value))
}

/// Merges an urgency decision and an emotion selection. No decision logic.
///
/// `reasons` is copied from the decision's trace. Decisions produced by
/// [`decide_urgency`](super::decide_urgency) always carry at least one reason;
/// a hand-built [`UrgencyDecision`] must do the same.
pub fn compose(urgency: &UrgencyDecision, emotion: &EmotionSelection) -> AnalysisResult {
    debug_assert!(
        !urgency.trace.is_empty(),
        "urgency decision for '{}' has no reason codes",
        urgency.label
    );
    AnalysisResult {
        urgency_label: urgency.label.clone(),
        urgency_confidence: urgency.confidence,
        emotion_label: emotion.label.clone(),
        emotion_confidence: emotion.confidence,
        reasons: urgency.trace.clone(),
    }
}
