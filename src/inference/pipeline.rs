use std::sync::Arc;

use serde::Serialize;

use crate::bundle::ModelBundle;
use crate::device::Device;
use crate::error::{Error, InferenceError};
use crate::inference::classifier::Classifier;
use crate::inference::explainer::{Explainer, Explanation};
use crate::inference::image_input::PageImage;
use crate::inference::predictor::{PredictionResult, Predictor};
use crate::inference::preprocess::Preprocessor;

/// Prediction plus its rendered explanation, as served per image or page.
#[derive(Debug, Clone, Serialize)]
pub struct PageAnalysis {
    #[serde(flatten)]
    pub prediction: PredictionResult,
    /// `None` when the architecture has no spatial block to explain.
    pub gradcam_image: Option<String>,
}

/// Preprocessor, predictor and explainer for one loaded model. Built once
/// at start-up and shared by reference across request threads.
#[derive(Clone)]
pub struct Pipeline {
    model: Arc<dyn Classifier>,
    preprocessor: Preprocessor,
    predictor: Predictor,
    explainer: Explainer,
}

impl Pipeline {
    pub fn new(model: Arc<dyn Classifier>, label_names: Vec<String>, device: Device) -> Pipeline {
        let preprocessor = Preprocessor::new(model.input_size(), device);
        let predictor = Predictor::new(model.clone(), label_names.into());
        let explainer = Explainer::new(model.clone(), preprocessor);
        Pipeline { model, preprocessor, predictor, explainer }
    }

    /// Builds the model a bundle declares and wires the pipeline around it.
    pub fn from_bundle(bundle: &ModelBundle, device: Device) -> Result<Pipeline, Error> {
        let model = bundle.build_model(device)?;
        Ok(Pipeline::new(Arc::new(model), bundle.label_names.clone(), device))
    }

    pub fn with_default_threshold(mut self, threshold: f32) -> Result<Pipeline, InferenceError> {
        self.predictor = self.predictor.with_default_threshold(threshold)?;
        Ok(self)
    }

    pub fn model(&self) -> &Arc<dyn Classifier> {
        &self.model
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn label_names(&self) -> &[String] {
        self.predictor.label_names()
    }

    pub fn classify(&self, page: &PageImage, threshold: Option<f32>) -> Result<PredictionResult, InferenceError> {
        self.predictor.predict(&self.preprocessor.transform(page), threshold)
    }

    pub fn explain(&self, page: &PageImage) -> Result<Explanation, InferenceError> {
        self.explainer.explain(page)
    }

    /// Classifies `page` and explains the predicted class, preprocessing once.
    /// An architecture that cannot be explained yields `gradcam_image: None`
    /// rather than failing the prediction.
    pub fn analyze(&self, page: &PageImage, threshold: Option<f32>) -> Result<PageAnalysis, InferenceError> {
        let input = self.preprocessor.transform(page);
        let prediction = self.predictor.predict(&input, threshold)?;
        let overlay = self.preprocessor.overlay(page);
        let gradcam_image = match self.explainer.explain_preprocessed(&input, &overlay, Some(prediction.label_id)) {
            Ok(explanation) => Some(explanation.data_uri),
            Err(InferenceError::UnsupportedArchitectureForExplanation(arch)) => {
                tracing::debug!(architecture = %arch, "skipping explanation");
                None
            }
            Err(e) => return Err(e),
        };
        Ok(PageAnalysis { prediction, gradcam_image })
    }
}
