//! Fraud Classification Service - Main Entry Point
//!
//! Loads the model artifact once, then serves `POST /predict`.

use anyhow::{Context, Result};
use fraud_classifier_service::{
    config::{AppConfig, LogFormat, LoggingConfig},
    create_router, AppState, ModelArtifact,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_logging(&config.logging)?;
    info!("Starting Fraud Classification Service");
    info!(
        artifact = %config.model.artifact_path.display(),
        onnx_threads = config.model.onnx_threads,
        "Configuration loaded successfully"
    );

    // The service cannot answer anything without its model
    let artifact = ModelArtifact::load(&config.model.artifact_path, config.model.onnx_threads)
        .context("Failed to load model artifact")?;
    info!(
        model = %artifact.engine().model_name(),
        features = artifact.extractor().feature_count(),
        threshold = artifact.threshold(),
        "Model artifact loaded"
    );

    let app = create_router(AppState::new(artifact));

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Service shutting down...");
    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "fraud_classifier_service={level},tower_http={level}",
            level = logging.level
        ))
        .context("Invalid logging.level")?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
