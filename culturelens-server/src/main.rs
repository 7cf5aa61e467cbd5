//! CultureLens server binary.
//!
//! Loads configuration, wires the interpretation pipeline, and serves the
//! HTTP API. External backends (text generation, vision, speech) are
//! optional at startup: a missing credential disables that capability and
//! the rest of the service keeps running.

mod routes;

use clap::Parser;
use culturelens_core::config::{load_config, AppConfig};
use culturelens_core::generation::{HttpGenerator, TextGenerator};
use culturelens_core::knowledge::KnowledgeResolver;
use culturelens_core::lens::{GenerativeLensInterpreter, LensInterpreter, StaticLensInterpreter};
use culturelens_core::narration::{ElevenLabsBackend, NarrationPipeline};
use culturelens_core::pipeline::InterpretPipeline;
use culturelens_core::store::SourceStore;
use culturelens_core::vision::{HttpVisionBackend, VisionResolver};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use routes::AppState;

/// CultureLens: multi-perspective cultural heritage interpretation
#[derive(Parser, Debug)]
#[command(name = "culturelens-server", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to culturelens.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind host override
    #[arg(long)]
    host: Option<String>,

    /// Bind port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::new(filter));
    tracing_subscriber::registry().with(stderr_layer).init();

    let mut config = load_config(cli.config.as_deref())?;
    for warning in config.validate() {
        warn!("Config: {}", warning);
    }
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let state = build_state(&config);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("CultureLens API listening on {}", addr);

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Assemble the pipeline and optional backends from configuration.
fn build_state(config: &AppConfig) -> AppState {
    let store = Arc::new(SourceStore::load(&config.store.data_dir));
    info!(
        landmarks = store.landmark_count(),
        data_dir = %config.store.data_dir.display(),
        "Source store loaded"
    );

    let generator: Option<Arc<dyn TextGenerator>> = match HttpGenerator::from_config(&config.generation)
    {
        Ok(g) => {
            info!(model = g.model_name(), "Text generation enabled");
            Some(Arc::new(g))
        }
        Err(e) => {
            warn!("Text generation disabled: {}", e);
            None
        }
    };

    let interpreter: Arc<dyn LensInterpreter> = match (config.interpreter.mode.as_str(), &generator)
    {
        ("generative", Some(g)) => Arc::new(GenerativeLensInterpreter::new(g.clone())),
        ("generative", None) => {
            warn!("Generative interpreter requested but no text backend is available; using static narratives");
            Arc::new(StaticLensInterpreter::new(store.clone()))
        }
        _ => Arc::new(StaticLensInterpreter::new(store.clone())),
    };

    let knowledge = KnowledgeResolver::new(store.clone(), generator.clone());
    let pipeline = Arc::new(InterpretPipeline::new(store.clone(), knowledge, interpreter));

    let vision = match HttpVisionBackend::from_config(&config.vision) {
        Ok(backend) => Some(Arc::new(VisionResolver::new(Arc::new(backend)))),
        Err(e) => {
            warn!("Image analysis disabled: {}", e);
            None
        }
    };

    let narration = match ElevenLabsBackend::from_config(&config.speech) {
        Ok(backend) => Some(Arc::new(NarrationPipeline::new(
            generator.clone(),
            Arc::new(backend),
        ))),
        Err(e) => {
            warn!("Audio narration disabled: {}", e);
            None
        }
    };

    AppState {
        pipeline,
        vision,
        narration,
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
