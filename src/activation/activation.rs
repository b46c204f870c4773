use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationFunction {
    ReLU,
    Identity,
}

impl ActivationFunction {
    pub fn function(&self, x: f32) -> f32 {
        match self {
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::Identity => x,
        }
    }

    pub fn apply(&self, values: &mut [f32]) {
        if *self == ActivationFunction::Identity {
            return;
        }
        for v in values.iter_mut() {
            *v = self.function(*v);
        }
    }
}

/// Softmax over a logit vector.
///
/// The maximum logit is subtracted before exponentiation so large logits do
/// not overflow; accumulation happens in f64 so the result sums to 1 within
/// f32 rounding.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits.iter().map(|&z| ((z - max) as f64).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|&e| (e / sum) as f32).collect()
}

/// Index of the largest value; on exact ties the lowest index wins.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
