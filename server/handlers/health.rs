use crate::routes::{json_response, Reply};

// GET /health
pub fn handle() -> Reply {
    json_response(200, &serde_json::json!({ "status": "ok" }))
}
