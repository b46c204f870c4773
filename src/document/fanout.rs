use serde::Serialize;

use crate::document::rasterizer::PageRasterizer;
use crate::error::DocumentError;
use crate::inference::{Pipeline, PredictionResult};

/// Result for one page. A page that failed carries `error` and no
/// prediction; the other pages are unaffected.
#[derive(Debug, Clone, Serialize)]
pub struct PageOutcome {
    /// 1-based.
    pub page_number: usize,
    #[serde(flatten)]
    pub prediction: Option<PredictionResult>,
    pub gradcam_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentPrediction {
    pub num_pages: usize,
    pub pages: Vec<PageOutcome>,
}

/// Rasterizes `document` and runs prediction plus explanation on every page
/// in order.
pub fn classify_document(
    pipeline: &Pipeline,
    rasterizer: &dyn PageRasterizer,
    document: &[u8],
    threshold: Option<f32>,
) -> Result<DocumentPrediction, DocumentError> {
    let pages = rasterizer.rasterize(document)?;
    if pages.is_empty() {
        return Err(DocumentError::NoPages);
    }

    let outcomes: Vec<PageOutcome> = pages
        .into_iter()
        .enumerate()
        .map(|(index, page)| {
            let page_number = index + 1;
            let analysis = page
                .map_err(|e| e.to_string())
                .and_then(|page| pipeline.analyze(&page, threshold).map_err(|e| e.to_string()));
            match analysis {
                Ok(analysis) => PageOutcome {
                    page_number,
                    prediction: Some(analysis.prediction),
                    gradcam_image: analysis.gradcam_image,
                    error: None,
                },
                Err(error) => {
                    tracing::warn!(page = page_number, %error, "page failed");
                    PageOutcome { page_number, prediction: None, gradcam_image: None, error: Some(error) }
                }
            }
        })
        .collect();

    tracing::info!(
        num_pages = outcomes.len(),
        failed = outcomes.iter().filter(|p| p.error.is_some()).count(),
        "document classified"
    );
    Ok(DocumentPrediction { num_pages: outcomes.len(), pages: outcomes })
}
