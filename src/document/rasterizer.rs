use crate::error::DocumentError;
use crate::inference::PageImage;

/// Resolution pages are rendered at unless configured otherwise.
pub const DEFAULT_DPI: u32 = 200;

/// Turns a multi-page document into one raster per page.
///
/// The outer `Result` covers the document as a whole (unreadable bytes, no
/// backend). Each page carries its own `Result` so one bad page does not
/// discard the rest.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, document: &[u8]) -> Result<Vec<Result<PageImage, DocumentError>>, DocumentError>;
}

/// Stand-in used when the binary was built without a PDF backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRasterizer;

impl PageRasterizer for UnavailableRasterizer {
    fn rasterize(&self, _document: &[u8]) -> Result<Vec<Result<PageImage, DocumentError>>, DocumentError> {
        Err(DocumentError::CapabilityUnavailable(
            "PDF support requires building with the 'pdf' feature and a pdfium library on the system".into(),
        ))
    }
}

#[cfg(feature = "pdf")]
pub use pdfium::PdfiumRasterizer;

#[cfg(feature = "pdf")]
mod pdfium {
    use image::{DynamicImage, RgbaImage};
    use pdfium_render::prelude::*;

    use super::PageRasterizer;
    use crate::error::DocumentError;
    use crate::inference::PageImage;

    /// Renders PDF pages through a system or co-located pdfium library.
    ///
    /// The library is bound per call, so the rasterizer itself holds no
    /// handles and is freely shared between threads.
    #[derive(Debug, Clone, Copy)]
    pub struct PdfiumRasterizer {
        pub dpi: u32,
    }

    impl PdfiumRasterizer {
        pub fn new(dpi: u32) -> PdfiumRasterizer {
            PdfiumRasterizer { dpi }
        }

        fn bind() -> Result<Pdfium, DocumentError> {
            let bindings = Pdfium::bind_to_system_library()
                .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")))
                .map_err(|e| DocumentError::CapabilityUnavailable(format!("failed to bind pdfium library: {e}")))?;
            Ok(Pdfium::new(bindings))
        }

        fn render(&self, page: &PdfPage, number: usize) -> Result<PageImage, DocumentError> {
            let scale = self.dpi as f32 / 72.0;
            let width = (page.width().value * scale).round().max(1.0) as i32;
            let height = (page.height().value * scale).round().max(1.0) as i32;
            let bitmap = page
                .render_with_config(&PdfRenderConfig::new().set_target_width(width).set_target_height(height))
                .map_err(|e| DocumentError::PageRender { page: number, reason: e.to_string() })?;
            let rgba = RgbaImage::from_raw(width as u32, height as u32, bitmap.as_rgba_bytes()).ok_or_else(|| {
                DocumentError::PageRender { page: number, reason: "bitmap size does not match page size".into() }
            })?;
            Ok(PageImage::new(DynamicImage::ImageRgba8(rgba)))
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn rasterize(&self, document: &[u8]) -> Result<Vec<Result<PageImage, DocumentError>>, DocumentError> {
            let pdfium = Self::bind()?;
            let doc = pdfium
                .load_pdf_from_byte_slice(document, None)
                .map_err(|e| DocumentError::Unreadable(e.to_string()))?;
            let pages = doc
                .pages()
                .iter()
                .enumerate()
                .map(|(index, page)| self.render(&page, index + 1))
                .collect();
            Ok(pages)
        }
    }
}
