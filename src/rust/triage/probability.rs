use ndarray::Array1;

use super::error::TriageError;
use super::utils::softmax_with_temperature;

/// Maximum distance from 1.0 the sum of a probability vector may drift.
pub const SUM_TOLERANCE: f32 = 1e-3;

/// Per-class probabilities aligned to a label set.
///
/// Construction does not validate; [`ProbabilityVector::validate`] is run by
/// the decision engine and the emotion selector against their label set so
/// that malformed classifier output surfaces as [`TriageError::InvalidInput`]
/// instead of being clamped or renormalised.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityVector(Array1<f32>);

impl ProbabilityVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(Array1::from(values))
    }

    /// Softmax of `logits / temperature`.
    pub fn from_logits(logits: &[f32], temperature: f32) -> Result<Self, TriageError> {
        check_temperature(temperature)?;
        let logits = Array1::from(logits.to_vec());
        if let Some(bad) = logits.iter().find(|x| !x.is_finite()) {
            return Err(TriageError::InvalidInput(format!("Non-finite logit: {}", bad)));
        }
        Ok(Self(softmax_with_temperature(&logits, temperature)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }

    pub fn as_array(&self) -> &Array1<f32> {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.0.to_vec()
    }

    /// Checks the vector against an expected class count.
    ///
    /// # Errors
    /// `InvalidInput` if `expected_len` is zero, the length differs, any value
    /// is outside `[0, 1]` or non-finite, or the sum is not 1.0 within
    /// [`SUM_TOLERANCE`].
    pub fn validate(&self, expected_len: usize) -> Result<(), TriageError> {
        if expected_len == 0 {
            return Err(TriageError::InvalidInput("Label set is empty".into()));
        }
        if self.len() != expected_len {
            return Err(TriageError::InvalidInput(format!(
                "Probability vector has {} entries but the label set has {}",
                self.len(),
                expected_len
            )));
        }
        self.check_range()?;
        let sum = self.0.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(TriageError::InvalidInput(format!(
                "Probabilities sum to {} (tolerance {})",
                sum, SUM_TOLERANCE
            )));
        }
        Ok(())
    }

    /// Re-applies a temperature to probabilities that were produced at T=1.
    ///
    /// `p_i^(1/T) / sum_j p_j^(1/T)` equals `softmax(z / T)` for the logits `z`
    /// behind `p`, so a plain softmax output can be calibrated after the fact.
    ///
    /// # Errors
    /// `InvalidInput` if any value is outside `[0, 1]` or non-finite; such
    /// vectors are rejected rather than clamped. The sum is not checked here,
    /// see [`ProbabilityVector::validate`].
    pub fn tempered(&self, temperature: f32) -> Result<Self, TriageError> {
        check_temperature(temperature)?;
        self.check_range()?;
        if temperature == 1.0 {
            return Ok(self.clone());
        }
        let exponent = 1.0 / temperature;
        let powered = self.0.mapv(|p| p.powf(exponent));
        let sum = powered.sum();
        if sum <= 0.0 || !sum.is_finite() {
            return Err(TriageError::InvalidInput(
                "Cannot re-temper a vector with no probability mass".into(),
            ));
        }
        Ok(Self(powered / sum))
    }

    fn check_range(&self) -> Result<(), TriageError> {
        match self
            .0
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < 0.0 || **p > 1.0)
        {
            Some((i, p)) => Err(TriageError::InvalidInput(format!(
                "Probability at index {} is outside [0, 1]: {}",
                i, p
            ))),
            None => Ok(()),
        }
    }
}

impl From<Vec<f32>> for ProbabilityVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

fn check_temperature(temperature: f32) -> Result<(), TriageError> {
    if temperature.is_finite() && temperature > 0.0 {
        Ok(())
    } else {
        Err(TriageError::Configuration(format!(
            "Temperature must be finite and > 0, got {}",
            temperature
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_normalized() {
        let probs = ProbabilityVector::new(vec![0.1, 0.85, 0.05]);
        assert!(probs.validate(3).is_ok());
    }

    #[test]
    fn test_validate_rejects_overfull_vector() {
        let probs = ProbabilityVector::new(vec![0.5, 0.6]);
        assert!(matches!(probs.validate(2), Err(TriageError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_dimension_mismatch() {
        let probs = ProbabilityVector::new(vec![0.5, 0.5]);
        assert!(matches!(probs.validate(3), Err(TriageError::InvalidInput(_))));
        assert!(matches!(probs.validate(0), Err(TriageError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let probs = ProbabilityVector::new(vec![1.2, -0.2]);
        assert!(matches!(probs.validate(2), Err(TriageError::InvalidInput(_))));
        let probs = ProbabilityVector::new(vec![f32::NAN, 1.0]);
        assert!(matches!(probs.validate(2), Err(TriageError::InvalidInput(_))));
    }

    #[test]
    fn test_tempered_matches_scaled_logits() {
        let logits = [2.0, 0.5, -1.0];
        let plain = ProbabilityVector::from_logits(&logits, 1.0).unwrap();
        let direct = ProbabilityVector::from_logits(&logits, 2.5).unwrap();
        let tempered = plain.tempered(2.5).unwrap();
        for (a, b) in direct.as_array().iter().zip(tempered.as_array().iter()) {
            assert!((a - b).abs() < 1e-5, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_tempered_rejects_out_of_range() {
        let probs = ProbabilityVector::new(vec![0.5, -0.1, 0.6]);
        assert!(matches!(probs.tempered(1.5), Err(TriageError::InvalidInput(_))));
        let probs = ProbabilityVector::new(vec![f32::NAN, 1.0]);
        assert!(matches!(probs.tempered(1.5), Err(TriageError::InvalidInput(_))));
        // also at T=1, where no re-tempering happens
        let probs = ProbabilityVector::new(vec![-0.3, 1.3]);
        assert!(matches!(probs.tempered(1.0), Err(TriageError::InvalidInput(_))));
    }

    #[test]
    fn test_bad_temperature_is_configuration_error() {
        let probs = ProbabilityVector::new(vec![1.0]);
        assert!(matches!(probs.tempered(0.0), Err(TriageError::Configuration(_))));
        assert!(matches!(
            ProbabilityVector::from_logits(&[1.0], -1.0),
            Err(TriageError::Configuration(_))
        ));
    }
}
