mod common;

use image::{DynamicImage, GrayImage, Luma};

use ferrite_doc::document::{classify_document, PageRasterizer, UnavailableRasterizer};
use ferrite_doc::{Architecture, Device, DocumentError, PageImage, Pipeline};

use common::{bundle, zero_state};

/// Serves canned pages; `None` entries fail to render.
struct CannedPages(Vec<Option<u8>>);

impl PageRasterizer for CannedPages {
    fn rasterize(&self, document: &[u8]) -> Result<Vec<Result<PageImage, DocumentError>>, DocumentError> {
        if !document.starts_with(b"%PDF") {
            return Err(DocumentError::Unreadable("missing PDF header".into()));
        }
        Ok(self
            .0
            .iter()
            .enumerate()
            .map(|(i, level)| match level {
                Some(level) => Ok(PageImage::new(DynamicImage::ImageLuma8(GrayImage::from_pixel(17, 23, Luma([*level]))))),
                None => Err(DocumentError::PageRender { page: i + 1, reason: "corrupt content stream".into() }),
            })
            .collect())
    }
}

fn pipeline() -> Pipeline {
    let b = bundle(Architecture::ResNet18, &["cover", "body", "annex"], 32, zero_state(Architecture::ResNet18, 3, 32));
    Pipeline::from_bundle(&b, Device::Cpu).unwrap()
}

#[test]
fn every_page_is_classified_in_order() {
    let pages = CannedPages(vec![Some(0), Some(128), Some(255)]);
    let result = classify_document(&pipeline(), &pages, b"%PDF-1.7", Some(0.3)).unwrap();

    assert_eq!(result.num_pages, 3);
    let numbers: Vec<usize> = result.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    for page in &result.pages {
        let prediction = page.prediction.as_ref().unwrap();
        assert_eq!(prediction.probabilities.len(), 3);
        assert!(!prediction.abstained, "1/3 clears a 0.3 threshold");
        assert!(page.gradcam_image.as_deref().unwrap().starts_with("data:image/png;base64,"));
        assert!(page.error.is_none());
    }
}

#[test]
fn a_broken_page_does_not_sink_the_document() {
    let pages = CannedPages(vec![Some(40), None, Some(200)]);
    let result = classify_document(&pipeline(), &pages, b"%PDF-1.7", None).unwrap();

    assert_eq!(result.num_pages, 3);
    assert!(result.pages[0].prediction.is_some());
    assert!(result.pages[1].prediction.is_none());
    assert!(result.pages[1].error.as_deref().unwrap().contains("page 2"));
    assert!(result.pages[2].prediction.is_some());

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["pages"][0]["page_number"], 1);
    assert_eq!(json["pages"][0]["label_name"], "cover");
    assert!(json["pages"][0].get("error").is_none());
    assert_eq!(json["pages"][1]["page_number"], 2);
    assert!(json["pages"][1].get("label_id").is_none());
}

#[test]
fn document_level_failures_surface_as_errors() {
    let p = pipeline();
    assert!(matches!(
        classify_document(&p, &CannedPages(vec![]), b"%PDF-1.7", None),
        Err(DocumentError::NoPages)
    ));
    assert!(matches!(
        classify_document(&p, &CannedPages(vec![Some(1)]), b"GIF89a", None),
        Err(DocumentError::Unreadable(_))
    ));
    assert!(matches!(
        classify_document(&p, &UnavailableRasterizer, b"%PDF-1.7", None),
        Err(DocumentError::CapabilityUnavailable(_))
    ));
}
