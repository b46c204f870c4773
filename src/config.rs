use std::path::PathBuf;

use clap::Parser;

use crate::document::{PageRasterizer, DEFAULT_DPI};
use crate::inference::DEFAULT_THRESHOLD;

/// Service settings. Every flag falls back to a `FERRITE_DOC_*` environment
/// variable, then to the default shown.
#[derive(Debug, Clone, Parser)]
#[command(name = "ferrite-doc-server", about = "Document image classification service", version)]
pub struct ServiceConfig {
    /// Model bundle (JSON) loaded once at start-up.
    #[arg(long, env = "FERRITE_DOC_BUNDLE", default_value = "assets/model_complete.json")]
    pub bundle: PathBuf,

    /// Classification report served by `/metrics/test`.
    #[arg(long, env = "FERRITE_DOC_METRICS", default_value = "assets/test_metrics.json")]
    pub metrics: PathBuf,

    /// Directory served under `/static`.
    #[arg(long, env = "FERRITE_DOC_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    #[arg(long, env = "FERRITE_DOC_ADDR", default_value = "127.0.0.1:8000")]
    pub addr: String,

    /// Base URL clients use to reach this service; chart URLs are built on it.
    #[arg(long, env = "FERRITE_DOC_PUBLIC_URL", default_value = "http://localhost:8000")]
    pub public_base_url: String,

    /// Origins allowed by CORS, comma separated.
    #[arg(
        long,
        env = "FERRITE_DOC_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:3000,http://127.0.0.1:3000"
    )]
    pub cors_origins: Vec<String>,

    /// Confidence below which predictions are flagged as abstained.
    #[arg(long, env = "FERRITE_DOC_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f32,

    /// Resolution PDF pages are rendered at.
    #[arg(long, env = "FERRITE_DOC_PDF_DPI", default_value_t = DEFAULT_DPI)]
    pub pdf_dpi: u32,

    /// Worker threads for the compute pool (defaults to one per core).
    #[arg(long, env = "FERRITE_DOC_THREADS")]
    pub threads: Option<usize>,
}

impl ServiceConfig {
    /// Absolute URL of a file under the static directory.
    pub fn static_url(&self, file: &str) -> String {
        format!("{}/static/{}", self.public_base_url.trim_end_matches('/'), file)
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        self.cors_origins.iter().any(|o| o == origin)
    }

    /// The PDF backend compiled into this build.
    pub fn rasterizer(&self) -> Box<dyn PageRasterizer> {
        #[cfg(feature = "pdf")]
        {
            Box::new(crate::document::PdfiumRasterizer::new(self.pdf_dpi))
        }
        #[cfg(not(feature = "pdf"))]
        {
            Box::new(crate::document::UnavailableRasterizer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let config = ServiceConfig::try_parse_from([
            "server",
            "--bundle",
            "/models/docs.json",
            "--public-base-url",
            "https://docs.example.com/",
            "--cors-origins",
            "https://a.example.com,https://b.example.com",
            "--threshold",
            "0.5",
        ])
        .unwrap();
        assert_eq!(config.bundle, PathBuf::from("/models/docs.json"));
        assert_eq!(config.threshold, 0.5);
        assert!(config.allows_origin("https://b.example.com"));
        assert!(!config.allows_origin("http://localhost:3000"));
        assert_eq!(
            config.static_url("confusion_matrix.png"),
            "https://docs.example.com/static/confusion_matrix.png"
        );
    }
}
