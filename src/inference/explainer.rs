use std::sync::Arc;

use image::RgbImage;

use crate::error::InferenceError;
use crate::inference::classifier::Classifier;
use crate::inference::heatmap::Heatmap;
use crate::inference::image_input::PageImage;
use crate::inference::overlay::{blend, to_data_uri};
use crate::inference::preprocess::{PreprocessedTensor, Preprocessor};

/// A rendered class-activation map.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub target_class: usize,
    /// Saliency at the target block's own resolution.
    pub heatmap: Heatmap,
    /// Overlay at `input_size × input_size`.
    pub image: RgbImage,
    pub data_uri: String,
}

/// Grad-CAM over the model's final spatial block.
///
/// Every call allocates its own activation and gradient buffers and drops
/// them before returning, so explanations may run concurrently with each
/// other and with plain predictions.
#[derive(Clone)]
pub struct Explainer {
    model: Arc<dyn Classifier>,
    preprocessor: Preprocessor,
}

impl Explainer {
    pub fn new(model: Arc<dyn Classifier>, preprocessor: Preprocessor) -> Explainer {
        Explainer { model, preprocessor }
    }

    /// Explains the model's top class for `page`.
    pub fn explain(&self, page: &PageImage) -> Result<Explanation, InferenceError> {
        let input = self.preprocessor.transform(page);
        let overlay = self.preprocessor.overlay(page);
        self.explain_preprocessed(&input, &overlay, None)
    }

    /// Explains class `class` (the top class when `None`) for an input that
    /// has already been through the preprocessor, drawing over `overlay`.
    pub fn explain_preprocessed(
        &self,
        input: &PreprocessedTensor,
        overlay: &RgbImage,
        class: Option<usize>,
    ) -> Result<Explanation, InferenceError> {
        let capture = self.model.class_activation(input.as_tensor(), class)?;
        let heatmap = Heatmap::grad_cam(&capture)?;
        let (w, h) = overlay.dimensions();
        let image = blend(overlay, &heatmap.upsample(w as usize, h as usize));
        let data_uri = to_data_uri(&image)?;
        tracing::debug!(
            target_class = capture.target_class,
            map_width = heatmap.width,
            map_height = heatmap.height,
            blank = heatmap.is_blank(),
            "class activation map rendered"
        );
        Ok(Explanation { target_class: capture.target_class, heatmap, image, data_uri })
    }
}
