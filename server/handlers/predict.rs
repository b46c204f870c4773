use tiny_http::Request;

use ferrite_doc::{classify_document, DocumentError, InferenceError, PageImage};

use crate::routes::{error_response, json_response, read_body, request_header, Reply};
use crate::state::AppState;
use crate::util::form::query_get;
use crate::util::multipart::{extract_boundary, first_file, FilePart};

// ---------------------------------------------------------------------------
// Upload extraction
// ---------------------------------------------------------------------------

fn read_upload(request: &mut Request) -> Result<FilePart, Reply> {
    let content_type = request_header(request, "Content-Type").unwrap_or_default();
    if !content_type.starts_with("multipart/form-data") {
        return Err(error_response(400, "Expected a multipart/form-data upload"));
    }
    let boundary = extract_boundary(&content_type)
        .ok_or_else(|| error_response(400, "Missing multipart boundary"))?;
    let body = read_body(request)?;
    let upload = first_file(&body, &boundary).ok_or_else(|| error_response(400, "No file was uploaded"))?;
    tracing::debug!(
        field = upload.field.as_deref().unwrap_or(""),
        filename = %upload.filename,
        content_type = %upload.content_type,
        bytes = upload.data.len(),
        "upload received"
    );
    Ok(upload)
}

fn threshold_param(query: &[(String, String)]) -> Result<Option<f32>, Reply> {
    match query_get(query, "threshold") {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<f32>()
            .map(Some)
            .map_err(|_| error_response(400, format!("Invalid threshold '{raw}'"))),
    }
}

fn inference_failure(e: InferenceError) -> Reply {
    match e {
        InferenceError::InvalidThreshold(_) => error_response(400, e.to_string()),
        InferenceError::ImageDecode(_) => error_response(400, "Could not read image file"),
        other => {
            tracing::error!(error = %other, "inference failed");
            error_response(500, other.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// POST /predict-image
// ---------------------------------------------------------------------------

pub fn handle_image(request: &mut Request, query: &[(String, String)], state: &AppState) -> Reply {
    let upload = match read_upload(request) {
        Ok(upload) => upload,
        Err(reply) => return reply,
    };
    let threshold = match threshold_param(query) {
        Ok(t) => t,
        Err(reply) => return reply,
    };
    predict_image(state, &upload, threshold)
}

pub fn predict_image(state: &AppState, upload: &FilePart, threshold: Option<f32>) -> Reply {
    if !upload.content_type.starts_with("image/") {
        return error_response(400, "File must be an image");
    }
    let page = match PageImage::decode(&upload.data) {
        Ok(page) => page,
        Err(_) => return error_response(400, "Could not read image file"),
    };
    match state.pipeline.analyze(&page, threshold) {
        Ok(analysis) => json_response(200, &analysis),
        Err(e) => inference_failure(e),
    }
}

// ---------------------------------------------------------------------------
// POST /predict-pdf
// ---------------------------------------------------------------------------

pub fn handle_pdf(request: &mut Request, query: &[(String, String)], state: &AppState) -> Reply {
    let upload = match read_upload(request) {
        Ok(upload) => upload,
        Err(reply) => return reply,
    };
    let threshold = match threshold_param(query) {
        Ok(t) => t,
        Err(reply) => return reply,
    };
    predict_pdf(state, &upload, threshold)
}

pub fn predict_pdf(state: &AppState, upload: &FilePart, threshold: Option<f32>) -> Reply {
    let is_pdf = upload.filename.to_ascii_lowercase().ends_with(".pdf") || upload.content_type.contains("pdf");
    if !is_pdf {
        return error_response(400, "File must be a PDF");
    }
    if let Some(t) = threshold {
        if !(0.0..=1.0).contains(&t) {
            return inference_failure(InferenceError::InvalidThreshold(t));
        }
    }
    match classify_document(&state.pipeline, state.rasterizer.as_ref(), &upload.data, threshold) {
        Ok(prediction) => json_response(200, &prediction),
        Err(DocumentError::CapabilityUnavailable(reason)) => error_response(500, reason),
        Err(DocumentError::Unreadable(_)) => error_response(400, "Could not read PDF file"),
        Err(DocumentError::NoPages) => error_response(400, "PDF has no pages"),
        Err(e) => {
            tracing::error!(error = %e, "document classification failed");
            error_response(500, e.to_string())
        }
    }
}
