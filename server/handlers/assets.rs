use std::path::{Component, Path, PathBuf};

use crate::routes::{bytes_response, json_response, not_found, Reply};
use crate::state::AppState;
use crate::util::form::url_decode;

// GET /visualizations
pub fn handle_visualizations(state: &AppState) -> Reply {
    json_response(
        200,
        &serde_json::json!({
            "confusion_matrix_url": state.config.static_url("confusion_matrix.png"),
            "confidence_distribution_url": state.config.static_url("confidence_distribution.png"),
        }),
    )
}

// GET /comparison/images
pub fn handle_comparison(state: &AppState) -> Reply {
    json_response(
        200,
        &serde_json::json!({
            "model_comparison_url": state.config.static_url("model_comparison.png"),
            "f1_comparison_url": state.config.static_url("f1_score_comparison.png"),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /static/<file>
// ---------------------------------------------------------------------------

pub fn handle_static(state: &AppState, raw_path: &str) -> Reply {
    let path = match resolve_static(&state.config.static_dir, &url_decode(raw_path)) {
        Some(path) => path,
        None => return not_found(),
    };
    match std::fs::read(&path) {
        Ok(bytes) => bytes_response(200, content_type_for(&path), bytes),
        Err(_) => not_found(),
    }
}

/// Joins `relative` onto `root`, refusing anything that could climb out of it.
pub fn resolve_static(root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.is_empty() || relative.contains('\\') {
        return None;
    }
    let relative = Path::new(relative);
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(relative))
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "json" => "application/json",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_is_refused() {
        let root = Path::new("static");
        assert_eq!(resolve_static(root, "charts/cm.png"), Some(PathBuf::from("static/charts/cm.png")));
        assert_eq!(resolve_static(root, "../Cargo.toml"), None);
        assert_eq!(resolve_static(root, "a/../../b"), None);
        assert_eq!(resolve_static(root, "/etc/passwd"), None);
        assert_eq!(resolve_static(root, "..\\secret"), None);
        assert_eq!(resolve_static(root, ""), None);
    }

    #[test]
    fn content_types_follow_the_extension() {
        assert_eq!(content_type_for(Path::new("x/confusion_matrix.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("notes")), "application/octet-stream");
    }
}
