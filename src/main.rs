//! Command-line front end: classify one image or PDF from disk and print the
//! result as JSON.
//!
//!   ferrite-doc image scan.jpg --gradcam-out scan_cam.png
//!   ferrite-doc pdf contract.pdf --threshold 0.8
//!   ferrite-doc inspect --bundle assets/model_complete.json

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferrite_doc::document::{classify_document, DEFAULT_DPI};
use ferrite_doc::inference::from_data_uri;
use ferrite_doc::network::parameter_shapes;
use ferrite_doc::{Device, ModelBundle, PageImage, Pipeline, DEFAULT_THRESHOLD};

#[derive(Parser)]
#[command(name = "ferrite-doc", about = "Classify scanned documents", version)]
struct Cli {
    /// Model bundle (JSON).
    #[arg(long, global = true, env = "FERRITE_DOC_BUNDLE", default_value = "assets/model_complete.json")]
    bundle: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single image and explain the prediction.
    Image {
        path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f32,
        /// Also write the Grad-CAM overlay to this PNG.
        #[arg(long, value_name = "PNG")]
        gradcam_out: Option<PathBuf>,
    },
    /// Classify every page of a PDF.
    Pdf {
        path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f32,
        #[arg(long, default_value_t = DEFAULT_DPI)]
        dpi: u32,
    },
    /// Print what a bundle declares without running the model.
    Inspect,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferrite_doc=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let bundle = ModelBundle::load_json(&cli.bundle)
        .with_context(|| format!("loading bundle {}", cli.bundle.display()))?;

    let output = match cli.command {
        Command::Inspect => inspect(&bundle)?,
        Command::Image { path, threshold, gradcam_out } => {
            let pipeline = Pipeline::from_bundle(&bundle, Device::detect())?;
            let page = PageImage::open(&path)?;
            let analysis = pipeline.analyze(&page, Some(threshold))?;
            if let Some(out) = gradcam_out {
                match analysis.gradcam_image.as_deref() {
                    Some(uri) => from_data_uri(uri)?
                        .save(&out)
                        .with_context(|| format!("writing {}", out.display()))?,
                    None => tracing::warn!(
                        architecture = %bundle.architecture_name,
                        "model has no overlay to write, skipping --gradcam-out"
                    ),
                }
            }
            serde_json::to_value(&analysis)?
        }
        Command::Pdf { path, threshold, dpi } => {
            let pipeline = Pipeline::from_bundle(&bundle, Device::detect())?;
            let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let rasterizer = rasterizer(dpi);
            let prediction = classify_document(&pipeline, rasterizer.as_ref(), &bytes, Some(threshold))?;
            serde_json::to_value(&prediction)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn inspect(bundle: &ModelBundle) -> Result<serde_json::Value> {
    let architecture: ferrite_doc::Architecture = bundle.architecture_name.parse()?;
    let mut network = architecture.construct(bundle.num_classes, bundle.input_size);
    let expected: usize = parameter_shapes(&mut network)
        .iter()
        .map(|(_, shape)| shape.iter().product::<usize>())
        .sum();
    let stored: usize = bundle.weights.values().map(|t| t.numel()).sum();
    Ok(serde_json::json!({
        "architecture": bundle.architecture_name,
        "num_classes": bundle.num_classes,
        "input_size": bundle.input_size,
        "label_names": bundle.label_names,
        "explainable": architecture.supports_explanation(),
        "target_layer": network.final_spatial_block().map(|b| b.path()),
        "expected_values": expected,
        "stored_values": stored,
    }))
}

#[cfg(feature = "pdf")]
fn rasterizer(dpi: u32) -> Box<dyn ferrite_doc::PageRasterizer> {
    Box::new(ferrite_doc::document::PdfiumRasterizer::new(dpi))
}

#[cfg(not(feature = "pdf"))]
fn rasterizer(_dpi: u32) -> Box<dyn ferrite_doc::PageRasterizer> {
    Box::new(ferrite_doc::document::UnavailableRasterizer)
}
