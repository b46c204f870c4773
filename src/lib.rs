pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod device;
pub mod error;
pub mod bundle;
pub mod inference;
pub mod document;
pub mod metrics;
pub mod config;

// Convenience re-exports
pub use math::tensor::{Tensor, TensorError};
pub use device::Device;
pub use error::{BundleError, DocumentError, Error, InferenceError, MetricsError, ModelError, Result};
pub use bundle::loader::ModelBundle;
pub use network::architecture::Architecture;
pub use network::model::InferenceModel;
pub use inference::classifier::{ClassActivation, Classifier};
pub use inference::image_input::{Orientation, PageImage};
pub use inference::preprocess::{PreprocessedTensor, Preprocessor};
pub use inference::predictor::{PredictionResult, Predictor, DEFAULT_THRESHOLD};
pub use inference::explainer::{Explainer, Explanation};
pub use inference::pipeline::{PageAnalysis, Pipeline};
pub use document::{classify_document, DocumentPrediction, PageRasterizer};
pub use metrics::report::MetricsReport;
pub use config::ServiceConfig;
