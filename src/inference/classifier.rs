use crate::error::{InferenceError, ModelError};
use crate::math::Tensor;

/// Everything class-activation mapping needs from one forward/backward pass.
///
/// `activations` and `gradients` are both `[channels, h, w]` at the target
/// block's resolution. They are owned by the caller and dropped with this
/// value, so gradient state never outlives the call that produced it.
#[derive(Debug, Clone)]
pub struct ClassActivation {
    pub target_class: usize,
    pub logits: Vec<f32>,
    pub activations: Tensor,
    pub gradients: Tensor,
}

/// The model capability the predictor and explainer are built on.
///
/// Implementations must be immutable after construction: every method takes
/// `&self` and may be called concurrently from many threads.
pub trait Classifier: Send + Sync {
    fn architecture_name(&self) -> &str;

    fn num_classes(&self) -> usize;

    /// Square side length the model was trained at.
    fn input_size(&self) -> usize;

    /// Logits `[batch, num_classes]` for a `[batch, 3, size, size]` input.
    /// No gradient state is created.
    fn forward(&self, input: &Tensor) -> Result<Tensor, ModelError>;

    /// Forward pass with capture of the final spatial block, then a backward
    /// pass from logit `class` (the top logit when `None`) to that block.
    fn class_activation(&self, _input: &Tensor, _class: Option<usize>) -> Result<ClassActivation, InferenceError> {
        Err(InferenceError::UnsupportedArchitectureForExplanation(
            self.architecture_name().to_owned(),
        ))
    }

    /// Module path of the block `class_activation` reads, if any.
    fn target_layer(&self) -> Option<String> {
        None
    }
}
