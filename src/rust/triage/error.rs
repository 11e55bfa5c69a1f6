use ort::Error as OrtError;

/// Represents the different types of errors that can occur while triaging feedback.
///
/// The core never maps these to transport responses itself; callers use
/// [`TriageError::status_code`] to pick the HTTP-class outcome.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    /// The submitted text is empty, whitespace-only, or too long
    #[error("Invalid text: {0}")]
    InvalidText(String),
    /// A probability vector is malformed or does not line up with its label set.
    /// Inside the analyzer this always means the classifier produced bad output.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Label sets, calibration parameters or lexicon are unusable
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Error occurred while loading or using the tokenizer
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    /// Error occurred while loading or running the ONNX model
    #[error("Model error: {0}")]
    Model(String),
    /// The record store rejected or failed to persist a record
    #[error("Record store error: {0}")]
    Store(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TriageError {
    /// HTTP-class status a request boundary should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidText(_) => 400,
            Self::Configuration(_) => 503,
            Self::InvalidInput(_)
            | Self::Tokenizer(_)
            | Self::Model(_)
            | Self::Store(_)
            | Self::Io(_)
            | Self::Json(_) => 500,
        }
    }

    /// True when the caller sent something unusable, false for dependency or server faults.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<OrtError> for TriageError {
    fn from(err: OrtError) -> Self {
        TriageError::Model(err.to_string())
    }
}
