use super::error::TriageError;
use super::probability::ProbabilityVector;
use super::utils::argmax_excluding;
use crate::config::LabelSet;

/// The emotion with the highest calibrated probability.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionSelection {
    pub label: String,
    pub index: usize,
    pub confidence: f32,
}

/// Plain argmax over a calibrated emotion vector, ties to the lowest index.
///
/// # Errors
/// `InvalidInput` under the same rules as [`super::decide_urgency`].
pub fn select_emotion(
    probs: &ProbabilityVector,
    labels: &LabelSet,
) -> Result<EmotionSelection, TriageError> {
    probs.validate(labels.len())?;
    let values = probs.as_array();
    let index = argmax_excluding(values, None)
        .ok_or_else(|| TriageError::InvalidInput("Emotion vector is empty".into()))?;
    let label = labels
        .get(index)
        .ok_or_else(|| TriageError::InvalidInput(format!("No label at index {}", index)))?;

    Ok(EmotionSelection {
        label: label.to_string(),
        index,
        confidence: values[index],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_argmax() {
        let labels = LabelSet::new(["anger", "fear", "sadness"]).unwrap();
        let probs = ProbabilityVector::new(vec![0.2, 0.1, 0.7]);
        let selection = select_emotion(&probs, &labels).unwrap();
        assert_eq!(selection.label, "sadness");
        assert_eq!(selection.index, 2);
        assert_eq!(selection.confidence, 0.7);
    }

    #[test]
    fn test_permutation_keeps_label() {
        let labels = LabelSet::new(["anger", "fear", "sadness"]).unwrap();
        let probs = ProbabilityVector::new(vec![0.2, 0.1, 0.7]);
        let permuted_labels = LabelSet::new(["sadness", "anger", "fear"]).unwrap();
        let permuted_probs = ProbabilityVector::new(vec![0.7, 0.2, 0.1]);

        let a = select_emotion(&probs, &labels).unwrap();
        let b = select_emotion(&permuted_probs, &permuted_labels).unwrap();
        assert_eq!(a.label, b.label);
        assert_ne!(a.index, b.index);
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let labels = LabelSet::new(["neutral", "joy"]).unwrap();
        let probs = ProbabilityVector::new(vec![0.5, 0.5]);
        assert_eq!(select_emotion(&probs, &labels).unwrap().label, "neutral");
    }

    #[test]
    fn test_rejects_mismatched_vector() {
        let labels = LabelSet::new(["neutral", "joy"]).unwrap();
        let probs = ProbabilityVector::new(vec![0.2, 0.3, 0.5]);
        assert!(matches!(
            select_emotion(&probs, &labels),
            Err(TriageError::InvalidInput(_))
        ));
    }
}
