//! Review routing on top of an [`AnalysisResult`]: the dashboard emotion
//! schema, keyword topics, and the rule deciding whether a human should look.

use lazy_static::lazy_static;

use super::composer::AnalysisResult;
use super::decision::ReasonCode;

/// Topic assigned when no keyword matches.
pub const DEFAULT_TOPIC: &str = "Personal Issues";

/// Emotions that escalate a medium-urgency result.
const ESCALATING_EMOTIONS: [&str; 3] = ["anger", "fear", "sadness"];

lazy_static! {
    /// Topic keyword table, checked in declaration order.
    static ref TOPICS: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("Sleep Issues", vec!["نوم", "أرق", "منام"]),
        ("Work Stress", vec!["عمل", "وظيفة", "ضغط"]),
        ("Financial Stress", vec!["مال", "ديون", "راتب"]),
        ("Family Issues", vec!["عائلة", "أسرة", "أب", "أم"]),
        ("Crisis", vec!["انتحار", "إيذاء", "خطر"]),
        ("Exam Stress", vec!["امتحان", "اختبار", "دراسة"]),
        ("Personal Issues", vec!["شخصي", "نفسي"]),
    ];
}

/// Maps a model emotion name onto the dashboard's schema.
pub fn map_emotion_to_schema(emotion: &str) -> &'static str {
    match emotion.to_lowercase().as_str() {
        "anger" => "anger",
        "fear" => "fear",
        "sadness" => "sadness",
        "joy" | "love" => "happiness",
        "surprise" => "surprise",
        "disgust" => "disgust",
        "anticipation" => "anticipation",
        "optimism" => "optimism",
        "pessimism" => "pessimism",
        "confusion" => "confusion",
        _ => "neutral",
    }
}

/// First topic whose keyword occurs in `text`.
pub fn predict_topic(text: &str) -> &'static str {
    let folded = text.to_lowercase();
    TOPICS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| folded.contains(kw)))
        .map(|(topic, _)| *topic)
        .unwrap_or(DEFAULT_TOPIC)
}

/// Decides whether a result needs human review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub high_risk_label: String,
    pub medium_label: String,
}

impl EscalationPolicy {
    pub fn new(high_risk_label: impl Into<String>) -> Self {
        Self {
            high_risk_label: high_risk_label.into(),
            medium_label: "medium".to_string(),
        }
    }

    /// Flags high-risk urgency, any crisis override, and medium urgency with a
    /// negative emotion.
    pub fn should_flag(&self, result: &AnalysisResult) -> bool {
        let urgency = result.urgency_label.to_lowercase();
        if urgency == self.high_risk_label.to_lowercase()
            || result.reasons.contains(ReasonCode::CrisisOverride)
        {
            return true;
        }
        urgency == self.medium_label.to_lowercase()
            && ESCALATING_EMOTIONS.contains(&map_emotion_to_schema(&result.emotion_label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::DecisionTrace;

    fn result(urgency: &str, emotion: &str, reasons: &[ReasonCode]) -> AnalysisResult {
        AnalysisResult {
            urgency_label: urgency.into(),
            urgency_confidence: 0.6,
            emotion_label: emotion.into(),
            emotion_confidence: 0.6,
            reasons: reasons.iter().copied().collect::<DecisionTrace>(),
        }
    }

    #[test]
    fn test_emotion_mapping() {
        assert_eq!(map_emotion_to_schema("Joy"), "happiness");
        assert_eq!(map_emotion_to_schema("love"), "happiness");
        assert_eq!(map_emotion_to_schema("fear"), "fear");
        assert_eq!(map_emotion_to_schema("boredom"), "neutral");
    }

    #[test]
    fn test_topics_in_order() {
        assert_eq!(predict_topic("لا أستطيع النوم بسبب ضغط العمل"), "Sleep Issues");
        assert_eq!(predict_topic("عندي ديون كثيرة"), "Financial Stress");
        assert_eq!(predict_topic("hello"), DEFAULT_TOPIC);
    }

    #[test]
    fn test_flagging_rules() {
        let policy = EscalationPolicy::new("high");
        assert!(policy.should_flag(&result("high", "neutral", &[ReasonCode::CalibratedHigh])));
        assert!(policy.should_flag(&result(
            "low",
            "neutral",
            &[ReasonCode::CalibratedNonHigh, ReasonCode::CrisisOverride]
        )));
        assert!(policy.should_flag(&result("medium", "sadness", &[ReasonCode::CalibratedNonHigh])));
        assert!(!policy.should_flag(&result("medium", "joy", &[ReasonCode::CalibratedNonHigh])));
        assert!(!policy.should_flag(&result("low", "anger", &[ReasonCode::CalibratedNonHigh])));
    }
}
