pub mod fanout;
pub mod rasterizer;

pub use fanout::{classify_document, DocumentPrediction, PageOutcome};
#[cfg(feature = "pdf")]
pub use rasterizer::PdfiumRasterizer;
pub use rasterizer::{PageRasterizer, UnavailableRasterizer, DEFAULT_DPI};
