pub mod classifier;
pub mod explainer;
pub mod heatmap;
pub mod image_input;
pub mod overlay;
pub mod pipeline;
pub mod predictor;
pub mod preprocess;

pub use classifier::{ClassActivation, Classifier};
pub use explainer::{Explainer, Explanation};
pub use heatmap::Heatmap;
pub use image_input::{Orientation, PageImage};
pub use overlay::{blend, from_data_uri, jet, to_data_uri};
pub use pipeline::{PageAnalysis, Pipeline};
pub use predictor::{decide, PredictionResult, Predictor, DEFAULT_THRESHOLD};
pub use preprocess::{PreprocessedTensor, Preprocessor, NORMALIZE_MEAN, NORMALIZE_STD};
