use ferrite_doc::{MetricsError, MetricsReport};

use crate::routes::{error_response, json_response, Reply};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /metrics/test
// ---------------------------------------------------------------------------

pub fn handle_test(state: &AppState) -> Reply {
    match MetricsReport::load(&state.config.metrics, state.pipeline.label_names()) {
        Ok(report) => json_response(200, &report),
        Err(MetricsError::NotFound(path)) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            error_response(500, format!("{name} not found"))
        }
        Err(e) => {
            tracing::error!(error = %e, "metrics report unavailable");
            error_response(500, e.to_string())
        }
    }
}
