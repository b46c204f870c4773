use std::sync::Arc;

use ferrite_doc::{PageRasterizer, Pipeline, ServiceConfig};

/// Everything a request handler can see. Built once before the accept loop
/// starts and never mutated afterwards, so handlers share it without locks.
pub struct AppState {
    pub pipeline: Pipeline,
    pub config: ServiceConfig,
    pub rasterizer: Box<dyn PageRasterizer>,
}

/// Shared state passed to every handler.
pub type SharedState = Arc<AppState>;
