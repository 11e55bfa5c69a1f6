use ndarray::Array1;

/// Softmax over `logits / temperature`, shifted by the max logit for stability.
pub(crate) fn softmax_with_temperature(logits: &Array1<f32>, temperature: f32) -> Array1<f32> {
    if logits.is_empty() {
        return Array1::zeros(0);
    }
    let scaled = logits / temperature;
    let max = scaled.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp = scaled.mapv(|x| (x - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// Index of the largest value, skipping `exclude`. Ties go to the lowest index.
pub(crate) fn argmax_excluding(values: &Array1<f32>, exclude: Option<usize>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        if Some(i) == exclude {
            continue;
        }
        // strict comparison keeps the first of equal maxima
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Rounds to 4 decimal places for display.
pub(crate) fn round_4dp(value: f32) -> f32 {
    (value * 10_000.0).round() / 10_000.0
}
