use std::collections::HashMap;
use std::path::Path;

use log::{error, info};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::ProbabilitySource;
use crate::model_store::{Axis, ModelStore};
use crate::runtime::{create_session_builder, RuntimeConfig};
use crate::triage::{ProbabilityVector, TriageError};

/// Token budget per input, matching the fine-tuning setup.
pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 256;

/// A fine-tuned sequence classifier exported to ONNX, with its tokenizer.
///
/// The model is expected to:
/// - Accept `input_ids` and `attention_mask` (and optionally `token_type_ids`), shape `[1, seq_len]`
/// - Output logits of shape `[1, num_classes]`
///
/// Probabilities are `softmax(logits / temperature)`, so the output is calibrated.
#[derive(Debug)]
pub struct OnnxSource {
    axis: Axis,
    tokenizer: Tokenizer,
    session: Session,
    num_classes: usize,
    temperature: f32,
    max_sequence_length: usize,
    wants_token_type_ids: bool,
}

impl OnnxSource {
    /// Loads the model and tokenizer for `axis` from a model store.
    pub fn from_store(
        store: &ModelStore,
        axis: Axis,
        num_classes: usize,
        temperature: f32,
        runtime_config: &RuntimeConfig,
    ) -> Result<Self, TriageError> {
        if !store.has_model(axis) {
            return Err(TriageError::Configuration(format!(
                "No {} model under {:?}",
                axis,
                store.axis_dir(axis)
            )));
        }
        Self::from_files(
            axis,
            &store.model_path(axis),
            &store.tokenizer_path(axis),
            num_classes,
            temperature,
            runtime_config,
        )
    }

    pub fn from_files(
        axis: Axis,
        model_path: &Path,
        tokenizer_path: &Path,
        num_classes: usize,
        temperature: f32,
        runtime_config: &RuntimeConfig,
    ) -> Result<Self, TriageError> {
        if num_classes == 0 {
            return Err(TriageError::Configuration(format!("{} model needs at least one class", axis)));
        }
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(TriageError::Configuration(format!(
                "Temperature must be finite and > 0, got {}",
                temperature
            )));
        }

        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            error!("Failed to load {} tokenizer: {}", axis, e);
            TriageError::Tokenizer(format!("Failed to load tokenizer: {}", e))
        })?;
        info!("{} tokenizer loaded from {:?}", axis, tokenizer_path);

        let session = create_session_builder(runtime_config)?.commit_from_file(model_path)?;
        Self::validate_model(&session)?;
        let wants_token_type_ids = session.inputs.iter().any(|i| i.name == "token_type_ids");
        info!("{} model loaded from {:?}", axis, model_path);

        Ok(Self {
            axis,
            tokenizer,
            session,
            num_classes,
            temperature,
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            wants_token_type_ids,
        })
    }

    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = max_sequence_length.max(2);
        self
    }

    fn validate_model(session: &Session) -> Result<(), TriageError> {
        let names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        for required in ["input_ids", "attention_mask"] {
            if !names.contains(&required) {
                return Err(TriageError::Model(format!(
                    "Model is missing input '{}' (found {:?})",
                    required, names
                )));
            }
        }
        if session.outputs.is_empty() {
            return Err(TriageError::Model("Model must have at least 1 output for logits".into()));
        }
        Ok(())
    }

    /// Encodes with special tokens, truncating to the sequence budget but
    /// keeping the closing special token.
    fn tokenize(&self, text: &str) -> Result<Vec<i64>, TriageError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| TriageError::Tokenizer(e.to_string()))?;
        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        if ids.is_empty() {
            return Err(TriageError::Tokenizer("Text produced no tokens".into()));
        }
        if ids.len() > self.max_sequence_length {
            let last = ids[ids.len() - 1];
            ids.truncate(self.max_sequence_length - 1);
            ids.push(last);
        }
        Ok(ids)
    }

    fn logits(&self, ids: &[i64]) -> Result<Vec<f32>, TriageError> {
        let len = ids.len();
        let input_array = Array2::from_shape_vec((1, len), ids.to_vec())
            .map_err(|e| TriageError::Model(format!("Failed to create input array: {}", e)))?;
        let mask_array = Array2::from_elem((1, len), 1i64);

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            "input_ids",
            Tensor::from_array(input_array)
                .map_err(|e| TriageError::Model(format!("Failed to create input tensor: {}", e)))?,
        );
        input_tensors.insert(
            "attention_mask",
            Tensor::from_array(mask_array)
                .map_err(|e| TriageError::Model(format!("Failed to create mask tensor: {}", e)))?,
        );
        if self.wants_token_type_ids {
            input_tensors.insert(
                "token_type_ids",
                Tensor::from_array(Array2::<i64>::zeros((1, len))).map_err(|e| {
                    TriageError::Model(format!("Failed to create token type tensor: {}", e))
                })?,
            );
        }

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| TriageError::Model(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| TriageError::Model(format!("Failed to extract output tensor: {}", e)))?;

        let shape = output_tensor.shape().to_vec();
        if shape.last().copied() != Some(self.num_classes) {
            return Err(TriageError::InvalidInput(format!(
                "{} model produced logits of shape {:?} for {} labels",
                self.axis, shape, self.num_classes
            )));
        }
        Ok(output_tensor.iter().take(self.num_classes).cloned().collect())
    }
}

impl ProbabilitySource for OnnxSource {
    fn probabilities(&self, text: &str) -> Result<ProbabilityVector, TriageError> {
        let ids = self.tokenize(text)?;
        let logits = self.logits(&ids)?;
        ProbabilityVector::from_logits(&logits, self.temperature)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
