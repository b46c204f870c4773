use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::activation::{argmax, softmax};
use crate::error::InferenceError;
use crate::inference::classifier::Classifier;
use crate::inference::preprocess::PreprocessedTensor;

/// Confidence below which a prediction is flagged for human review.
pub const DEFAULT_THRESHOLD: f32 = 0.7;

/// Outcome of one classification.
///
/// `abstained` is a normal result state, not an error: the prediction is
/// still reported, flagged as not trustworthy enough to act on automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label_id: usize,
    pub label_name: String,
    pub confidence: f32,
    pub abstained: bool,
    pub probabilities: Vec<f32>,
}

/// Forward pass + softmax + abstention decision.
#[derive(Clone)]
pub struct Predictor {
    model: Arc<dyn Classifier>,
    label_names: Arc<[String]>,
    default_threshold: f32,
}

impl Predictor {
    pub fn new(model: Arc<dyn Classifier>, label_names: Arc<[String]>) -> Predictor {
        Predictor { model, label_names, default_threshold: DEFAULT_THRESHOLD }
    }

    pub fn with_default_threshold(mut self, threshold: f32) -> Result<Predictor, InferenceError> {
        self.default_threshold = check_threshold(threshold)?;
        Ok(self)
    }

    pub fn default_threshold(&self) -> f32 {
        self.default_threshold
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn predict(&self, input: &PreprocessedTensor, threshold: Option<f32>) -> Result<PredictionResult, InferenceError> {
        let threshold = check_threshold(threshold.unwrap_or(self.default_threshold))?;
        let logits = self.model.forward(input.as_tensor())?;
        let row = &logits.data[..self.model.num_classes().min(logits.data.len())];
        let result = decide(row, &self.label_names, threshold);
        tracing::debug!(
            label_id = result.label_id,
            confidence = result.confidence,
            abstained = result.abstained,
            "prediction"
        );
        Ok(result)
    }
}

/// Turns one logit row into a [`PredictionResult`].
///
/// The top class is the first maximum of the softmax distribution, and the
/// prediction abstains iff its probability is strictly below `threshold`.
pub fn decide(logits: &[f32], label_names: &[String], threshold: f32) -> PredictionResult {
    let probabilities = softmax(logits);
    let label_id = argmax(&probabilities).unwrap_or(0);
    let confidence = probabilities.get(label_id).copied().unwrap_or(0.0);
    let label_name = label_names
        .get(label_id)
        .cloned()
        .unwrap_or_else(|| label_id.to_string());
    PredictionResult {
        label_id,
        label_name,
        confidence,
        abstained: confidence < threshold,
        probabilities,
    }
}

fn check_threshold(threshold: f32) -> Result<f32, InferenceError> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(InferenceError::InvalidThreshold(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        ["invoice", "receipt", "form", "letter"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn probabilities_form_a_distribution() {
        let r = decide(&[2.0, -1.0, 0.5, 3.0], &labels(), 0.7);
        assert_eq!(r.probabilities.len(), 4);
        assert!(r.probabilities.iter().all(|&p| p >= 0.0));
        let sum: f32 = r.probabilities.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(r.label_id, 3);
        assert_eq!(r.label_name, "letter");
        assert_eq!(r.confidence, r.probabilities[3]);
    }

    #[test]
    fn ties_resolve_to_the_lowest_index() {
        let r = decide(&[1.0, 4.0, 4.0, 0.0], &labels(), 0.0);
        assert_eq!(r.label_id, 1);
        assert_eq!(r.label_name, "receipt");
    }

    #[test]
    fn abstains_strictly_below_threshold() {
        // Two equal logits of ln(3) against two zeros: top probability is 3/8.
        let z = 3.0f32.ln();
        let r = decide(&[z, z, 0.0, 0.0], &labels(), 0.5);
        assert!(r.abstained);

        let r = decide(&[0.0, 0.0, 0.0, 0.0], &labels(), 0.25);
        assert_eq!(r.confidence, 0.25);
        assert!(!r.abstained, "confidence equal to the threshold is accepted");

        let r = decide(&[0.0, 0.0, 0.0, 0.0], &labels(), 0.2500001);
        assert!(r.abstained);
    }

    #[test]
    fn low_top_probability_abstains_at_default_threshold() {
        // softmax([ln .42, ln .30, ln .18, ln .10]) = [.42, .30, .18, .10]
        let logits: Vec<f32> = [0.42f32, 0.30, 0.18, 0.10].iter().map(|p| p.ln()).collect();
        let r = decide(&logits, &labels(), DEFAULT_THRESHOLD);
        assert!((r.confidence - 0.42).abs() < 1e-5);
        assert_eq!(r.label_name, "invoice");
        assert!(r.abstained);
    }

    #[test]
    fn out_of_range_label_falls_back_to_the_index() {
        let r = decide(&[0.0, 5.0], &["only".to_owned()], 0.5);
        assert_eq!(r.label_id, 1);
        assert_eq!(r.label_name, "1");
    }

    #[test]
    fn thresholds_outside_the_unit_interval_are_rejected() {
        assert!(check_threshold(f32::NAN).is_err());
        assert!(check_threshold(1.5).is_err());
        assert_eq!(check_threshold(0.0).unwrap(), 0.0);
    }
}
