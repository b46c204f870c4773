/// ferrite-doc server
///
/// HTTP front end for the document classifier. Served by a synchronous
/// tiny_http server, one thread per request.
///
/// Run with:
///   cargo run --bin server --release -- --bundle assets/model_complete.json
/// Then POST an image to http://127.0.0.1:8000/predict-image
///
/// Routes:
///   GET  /health              liveness
///   POST /predict-image       prediction + Grad-CAM for one image
///   POST /predict-pdf         per-page predictions for a PDF
///   GET  /metrics/test        held-out evaluation metrics
///   GET  /visualizations      chart URLs
///   GET  /comparison/images   model comparison chart URLs
///   GET  /static/<file>       pre-rendered charts

mod handlers;
mod routes;
mod state;
mod util;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tiny_http::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferrite_doc::{Device, ModelBundle, Pipeline, ServiceConfig};

use state::AppState;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferrite_doc=info,server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServiceConfig::parse();

    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configuring compute threads")?;
    }
    let device = Device::detect();

    // Any failure here is a deployment error: refuse to serve.
    let bundle = ModelBundle::load_json(&config.bundle)
        .with_context(|| format!("loading model bundle {}", config.bundle.display()))?;
    let pipeline = Pipeline::from_bundle(&bundle, device)
        .context("building model")?
        .with_default_threshold(config.threshold)?;
    drop(bundle);

    let server = Server::http(config.addr.as_str()).map_err(|e| anyhow!("failed to bind {}: {}", config.addr, e))?;
    tracing::info!(addr = %config.addr, cors = ?config.cors_origins, "serving");

    let shared = Arc::new(AppState {
        pipeline,
        rasterizer: config.rasterizer(),
        config,
    });

    // Each request is dispatched on its own thread; the model is shared
    // read-only and needs no lock.
    for request in server.incoming_requests() {
        let state = shared.clone();
        std::thread::spawn(move || {
            routes::dispatch(request, state);
        });
    }
    Ok(())
}
