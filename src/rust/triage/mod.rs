//! Post-inference decision engine: crisis lexicon, calibrated urgency
//! decision, emotion selection and result composition. Everything here is a
//! pure function over immutable inputs.

mod composer;
mod decision;
mod emotion;
mod error;
pub mod escalation;
mod lexicon;
mod probability;
pub(crate) mod utils;

pub use composer::{compose, AnalysisResult};
pub(crate) use composer::serialize_rounded;
pub use decision::{
    decide_urgency, decide_urgency_for_text, DecisionTrace, ReasonCode, UrgencyDecision,
};
pub use emotion::{select_emotion, EmotionSelection};
pub use error::TriageError;
pub use escalation::EscalationPolicy;
pub use lexicon::{CrisisLexicon, DEFAULT_CRISIS_TERMS};
pub use probability::{ProbabilityVector, SUM_TOLERANCE};
