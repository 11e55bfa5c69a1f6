use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::triage::TriageError;

/// Environment variable overriding the models root.
pub const MODELS_ENV: &str = "RUKN_MODELS";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model artifact not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

impl From<ModelError> for TriageError {
    fn from(err: ModelError) -> Self {
        TriageError::Configuration(err.to_string())
    }
}

/// The two classification axes, each backed by its own model directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Urgency,
    Emotion,
}

impl Axis {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Urgency => "urgency_model",
            Self::Emotion => "emotion_model",
        }
    }

    pub fn meta_file(&self) -> &'static str {
        match self {
            Self::Urgency => "inference_meta.json",
            Self::Emotion => "emotion_meta.json",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Urgency => f.write_str("urgency"),
            Self::Emotion => f.write_str("emotion"),
        }
    }
}

/// Locates and verifies the model artifacts of both axes under one root.
#[derive(Debug, Clone)]
pub struct ModelStore {
    models_dir: PathBuf,
}

impl ModelStore {
    /// Creates a store rooted at the default models directory
    pub fn new_default() -> Self {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        if let Ok(path) = env::var(MODELS_ENV) {
            return PathBuf::from(path);
        }

        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("rukn").join("models");
        }

        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("rukn").join("models");
        }

        env::temp_dir().join("rukn").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn axis_dir(&self, axis: Axis) -> PathBuf {
        self.models_dir.join(axis.dir_name())
    }

    pub fn meta_path(&self, axis: Axis) -> PathBuf {
        self.axis_dir(axis).join(axis.meta_file())
    }

    pub fn model_path(&self, axis: Axis) -> PathBuf {
        self.axis_dir(axis).join("model.onnx")
    }

    pub fn tokenizer_path(&self, axis: Axis) -> PathBuf {
        self.axis_dir(axis).join("tokenizer.json")
    }

    /// True when the metadata file for `axis` exists.
    pub fn has_meta(&self, axis: Axis) -> bool {
        let path = self.meta_path(axis);
        log::debug!("Checking {} metadata at {:?} (exists: {})", axis, path, path.exists());
        path.exists()
    }

    /// True when the model and tokenizer for `axis` both exist.
    pub fn has_model(&self, axis: Axis) -> bool {
        let model_path = self.model_path(axis);
        let tokenizer_path = self.tokenizer_path(axis);
        log::info!("Checking if {} model is present:", axis);
        log::info!("  Model path: {:?} (exists: {})", model_path, model_path.exists());
        log::info!("  Tokenizer path: {:?} (exists: {})", tokenizer_path, tokenizer_path.exists());
        model_path.exists() && tokenizer_path.exists()
    }

    fn file_hash(path: &Path) -> Result<String, ModelError> {
        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Verifies each `file name -> sha256` entry against the axis directory.
    ///
    /// # Errors
    /// `NotFound` for a listed file that does not exist, `HashMismatch` for a
    /// file whose digest differs.
    pub fn verify_checksums(
        &self,
        axis: Axis,
        checksums: &BTreeMap<String, String>,
    ) -> Result<(), ModelError> {
        for (file, expected) in checksums {
            let path = self.axis_dir(axis).join(file);
            if !path.exists() {
                return Err(ModelError::NotFound(path));
            }
            log::info!("Verifying {} file: {:?}", axis, path);
            let actual = Self::file_hash(&path)?;
            if !actual.eq_ignore_ascii_case(expected) {
                log::error!("{} hash mismatch: expected {}, got {}", file, expected, actual);
                return Err(ModelError::HashMismatch {
                    file_type: file.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_layout() {
        let store = ModelStore::new("/srv/rukn");
        assert_eq!(
            store.meta_path(Axis::Urgency),
            PathBuf::from("/srv/rukn/urgency_model/inference_meta.json")
        );
        assert_eq!(
            store.tokenizer_path(Axis::Emotion),
            PathBuf::from("/srv/rukn/emotion_model/tokenizer.json")
        );
        assert_eq!(
            store.model_path(Axis::Emotion),
            PathBuf::from("/srv/rukn/emotion_model/model.onnx")
        );
    }

    #[test]
    fn test_checksum_verification() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        fs::create_dir_all(store.axis_dir(Axis::Urgency)).unwrap();
        fs::write(store.axis_dir(Axis::Urgency).join("tokenizer.json"), b"abc").unwrap();

        let mut checksums = BTreeMap::new();
        checksums.insert(
            "tokenizer.json".to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad".to_string(),
        );
        assert!(store.verify_checksums(Axis::Urgency, &checksums).is_ok());

        checksums.insert("tokenizer.json".to_string(), "00".repeat(32));
        assert!(matches!(
            store.verify_checksums(Axis::Urgency, &checksums),
            Err(ModelError::HashMismatch { .. })
        ));

        let mut missing = BTreeMap::new();
        missing.insert("model.onnx".to_string(), "00".repeat(32));
        assert!(matches!(
            store.verify_checksums(Axis::Urgency, &missing),
            Err(ModelError::NotFound(_))
        ));
    }
}
