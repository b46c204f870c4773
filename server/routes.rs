use std::io::{Cursor, Read};

use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::handlers;
use crate::state::SharedState;
use crate::util::form::{parse_query, split_url};

pub type Reply = Response<Cursor<Vec<u8>>>;

/// Uploads larger than this are rejected before parsing.
pub const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

pub fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

pub fn bytes_response(status: u16, content_type: &str, bytes: Vec<u8>) -> Reply {
    let len = bytes.len();
    Response::new(
        StatusCode(status),
        header("Content-Type", content_type).into_iter().collect(),
        Cursor::new(bytes),
        Some(len),
        None,
    )
}

pub fn json_response<T: Serialize>(status: u16, body: &T) -> Reply {
    match serde_json::to_vec(body) {
        Ok(bytes) => bytes_response(status, "application/json", bytes),
        Err(e) => {
            tracing::error!(error = %e, "could not serialise response");
            bytes_response(500, "application/json", br#"{"detail":"Internal Server Error"}"#.to_vec())
        }
    }
}

/// `{"detail": message}` with the given status.
pub fn error_response(status: u16, message: impl Into<String>) -> Reply {
    json_response(status, &serde_json::json!({ "detail": message.into() }))
}

pub fn not_found() -> Reply {
    error_response(404, "Not Found")
}

// ---------------------------------------------------------------------------
// Request plumbing
// ---------------------------------------------------------------------------

pub fn request_header(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_owned())
}

/// Reads the request body, refusing anything over [`MAX_BODY_BYTES`].
pub fn read_body(request: &mut Request) -> Result<Vec<u8>, Reply> {
    let mut body = Vec::new();
    request
        .as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body)
        .map_err(|e| error_response(400, format!("Could not read request body: {e}")))?;
    if body.len() as u64 > MAX_BODY_BYTES {
        return Err(error_response(413, "Upload too large"));
    }
    Ok(body)
}

/// Adds CORS headers when `origin` is on the allow-list.
fn apply_cors(response: &mut Reply, state: &SharedState, origin: Option<&str>, preflight: Option<(&str, &str)>) {
    let origin = match origin {
        Some(o) if state.config.allows_origin(o) => o,
        _ => return,
    };
    let mut headers = vec![
        header("Access-Control-Allow-Origin", origin),
        header("Access-Control-Allow-Credentials", "true"),
        header("Vary", "Origin"),
    ];
    if let Some((methods, request_headers)) = preflight {
        headers.push(header("Access-Control-Allow-Methods", methods));
        headers.push(header("Access-Control-Allow-Headers", request_headers));
        headers.push(header("Access-Control-Max-Age", "600"));
    }
    for h in headers.into_iter().flatten() {
        response.add_header(h);
    }
}

// ---------------------------------------------------------------------------
// Request dispatcher
// ---------------------------------------------------------------------------

/// Dispatches incoming requests to the appropriate handler.
///
/// Handlers receive a `&mut Request` so that the dispatcher retains
/// ownership and can call `request.respond(response)` at the end.
pub fn dispatch(mut request: Request, state: SharedState) {
    let method = request.method().clone();
    let url = request.url().to_owned();
    let (path, query) = split_url(&url);
    let query = parse_query(query);
    let origin = request_header(&request, "Origin");

    let mut preflight = None;
    let mut response = match (&method, path) {
        (Method::Options, _) => {
            let methods = request_header(&request, "Access-Control-Request-Method")
                .unwrap_or_else(|| "GET, POST, OPTIONS".into());
            let headers = request_header(&request, "Access-Control-Request-Headers").unwrap_or_else(|| "*".into());
            preflight = Some((methods, headers));
            bytes_response(204, "text/plain", Vec::new())
        }

        (Method::Get, "/health") => handlers::health::handle(),

        (Method::Post, "/predict-image") => handlers::predict::handle_image(&mut request, &query, &state),
        (Method::Post, "/predict-pdf") => handlers::predict::handle_pdf(&mut request, &query, &state),

        (Method::Get, "/metrics/test") => handlers::metrics::handle_test(&state),

        (Method::Get, "/visualizations") => handlers::assets::handle_visualizations(&state),
        (Method::Get, "/comparison/images") => handlers::assets::handle_comparison(&state),
        (Method::Get, p) if p.starts_with("/static/") => {
            handlers::assets::handle_static(&state, &p["/static/".len()..])
        }

        _ => not_found(),
    };

    apply_cors(
        &mut response,
        &state,
        origin.as_deref(),
        preflight.as_ref().map(|(m, h)| (m.as_str(), h.as_str())),
    );
    tracing::info!(method = %method, path, status = response.status_code().0, "request");
    if let Err(e) = request.respond(response) {
        tracing::warn!(error = %e, "failed to write response");
    }
}
