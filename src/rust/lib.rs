//! Calibrated urgency and emotion triage for short Arabic mental-health feedback.
//!
//! A classifier backend turns text into one probability vector per axis;
//! the triage core then applies a calibrated threshold for the high-risk
//! urgency class, a crisis-keyword override, and an argmax emotion choice,
//! returning an [`AnalysisResult`] with machine-readable reason codes.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use rukn::{decide_urgency, CalibrationParameters, LabelSet, ProbabilityVector, ReasonCode};
//!
//! let labels = LabelSet::new(["low", "high", "medium"])?;
//! let params = CalibrationParameters::new(1.0, 0.8, "high")?;
//!
//! let decision = decide_urgency(&ProbabilityVector::new(vec![0.1, 0.85, 0.05]), &labels, &params)?;
//! assert_eq!(decision.label, "high");
//! assert!(decision.trace.contains(ReasonCode::CalibratedHigh));
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! [`Analyzer`] is `Send + Sync`; share it with `Arc` across request handlers.
//! The core functions are pure and need no coordination at all.

pub mod analyzer;
pub mod backend;
pub mod config;
pub mod model_store;
mod runtime;
pub mod store;
pub mod triage;

pub use analyzer::{Analyzer, AnalyzerInfo, MAX_TEXT_CHARS};
pub use backend::{KeywordRule, KeywordSource, OnnxSource, ProbabilitySource};
pub use config::{
    AnalyzerConfig, CalibrationParameters, EmotionParameters, LabelSet, SharedConfig,
};
pub use model_store::{Axis, ModelError, ModelStore};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use store::{FeedbackRecord, FeedbackSubmission, InMemoryRecordStore, RecordStore};
pub use triage::{
    compose, decide_urgency, decide_urgency_for_text, select_emotion, AnalysisResult,
    CrisisLexicon, DecisionTrace, EmotionSelection, EscalationPolicy, ProbabilityVector,
    ReasonCode, TriageError, UrgencyDecision,
};

pub fn init_logger() {
    env_logger::init();
}
