use drishti_core::ServerConfig;
use drishti_narrate::{GroqProvider, Narrator};
use drishti_server::routes::create_router;
use drishti_server::state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    info!("🚀 Starting drishti-server...");

    let config = ServerConfig::from_env();
    if let Err(e) = config.validate() {
        anyhow::bail!("Invalid configuration: {e}");
    }
    let config = Arc::new(config);

    info!("👁️  Initializing detector...");
    let detector = load_detector(&config);
    match &detector {
        Some(d) => info!("✅ Detector ready ({})", d.device()),
        None => warn!("⚠️  Detector unavailable; frames will be rejected"),
    }

    info!("🗣️  Initializing narrator...");
    let narrator = match GroqProvider::from_env() {
        Ok(provider) => {
            info!("✅ Narration provider ready (groq)");
            Narrator::new(
                Some(Arc::new(provider)),
                Duration::from_secs(config.narration_timeout_secs),
            )
        }
        Err(e) => {
            warn!("⚠️  Narration offline: {}. Using fallback text.", e);
            Narrator::offline()
        }
    };

    let state = Arc::new(AppState::new(config.clone(), detector, Arc::new(narrator)));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("✅ Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Shutdown complete");
    Ok(())
}

#[cfg(feature = "onnx")]
fn load_detector(config: &ServerConfig) -> Option<Arc<dyn drishti_vision::Detector>> {
    match drishti_vision::OnnxDetector::new(
        &config.model_path,
        config.confidence_threshold,
        config.use_accelerator,
    ) {
        Ok(detector) => Some(Arc::new(detector)),
        Err(e) => {
            warn!("Failed to load model from {}: {}", config.model_path.display(), e);
            None
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn load_detector(_config: &ServerConfig) -> Option<Arc<dyn drishti_vision::Detector>> {
    warn!("Built without the onnx feature; no detector backend available");
    None
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("🛑 Shutdown signal received");
}
