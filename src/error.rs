//! Error types for the inference pipeline.
//!
//! Each stage owns an enum; [`Error`] aggregates them for callers that drive
//! the whole pipeline. Bundle and model errors are start-up fatal: a process
//! that hits one must not begin serving. Inference, document and metrics
//! errors reject a single request and leave the shared model untouched.

use std::path::PathBuf;

use thiserror::Error;

use crate::math::TensorError;

/// Failures while reading and validating a model bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("model bundle not found at {0}")]
    ArtifactNotFound(PathBuf),

    #[error("model bundle is malformed: {0}")]
    ArtifactMalformed(String),

    #[error("no state dict found in model bundle (looked for {})", .aliases.join(", "))]
    WeightsMissing { aliases: Vec<&'static str> },

    #[error("model bundle does not declare num_classes")]
    MissingClassCount,

    #[error("invalid bundle field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("bundle lists {labels} label names for {classes} classes")]
    LabelCountMismatch { labels: usize, classes: usize },

    #[error("could not read model bundle: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while building a model and loading its weights.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown architecture '{name}' (supported: {})", .supported.join(", "))]
    UnknownArchitecture { name: String, supported: Vec<&'static str> },

    #[error("size mismatch for {name}: checkpoint has shape {actual:?}, model expects {expected:?}")]
    WeightShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("missing parameter '{0}' in state dict")]
    MissingParameter(String),

    #[error("unexpected parameter '{0}' in state dict")]
    UnexpectedParameter(String),

    #[error("invalid model input: {0}")]
    InvalidInput(#[from] TensorError),
}

/// Failures while serving a single prediction or explanation.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("could not decode image: {0}")]
    ImageDecode(String),

    #[error("architecture '{0}' exposes no final spatial block to explain")]
    UnsupportedArchitectureForExplanation(String),

    #[error("confidence threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("could not encode heatmap: {0}")]
    Encode(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<TensorError> for InferenceError {
    fn from(e: TensorError) -> Self {
        InferenceError::Model(ModelError::InvalidInput(e))
    }
}

/// Failures of the multi-page document path.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{0}")]
    CapabilityUnavailable(String),

    #[error("could not read document: {0}")]
    Unreadable(String),

    #[error("document has no pages")]
    NoPages,

    #[error("could not render page {page}: {reason}")]
    PageRender { page: usize, reason: String },
}

/// Failures loading the pre-computed evaluation report.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("metrics report is malformed: {0}")]
    Malformed(String),

    #[error("could not read metrics report: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

impl Error {
    /// Deployment errors that must stop the process from serving.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, Error::Bundle(_) | Error::Model(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
