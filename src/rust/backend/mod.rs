//! Classifier backends that turn text into per-class probabilities.

mod keyword;
mod onnx;

pub use keyword::{KeywordRule, KeywordSource};
pub use onnx::{OnnxSource, DEFAULT_MAX_SEQUENCE_LENGTH};

use crate::triage::{ProbabilityVector, TriageError};

/// External classifier capability for one axis.
///
/// The returned vector must be aligned to that axis' label set. Sources that
/// apply their axis temperature themselves report `is_calibrated() == true`;
/// otherwise the analyzer re-tempers the plain softmax output before any
/// decision is made.
pub trait ProbabilitySource: Send + Sync {
    fn probabilities(&self, text: &str) -> Result<ProbabilityVector, TriageError>;

    fn is_calibrated(&self) -> bool {
        true
    }

    /// Short backend identifier for logs and service info.
    fn name(&self) -> &str;
}
