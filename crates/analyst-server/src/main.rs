//! crypto-analyst HTTP Server
//!
//! Axum server exposing market-data retrieval and LLM trading analysis.

mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::LlmProvider;
use agent_runtime::{GroqConfig, GroqProvider};
use crypto_analyst::{AnalystConfig, MarketAnalyst};

use crate::routes::router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AnalystConfig::from_env()?;

    // LLM provider is optional: without a key only data-only jobs succeed
    let groq = GroqConfig::from_env()?;
    let provider: Option<Arc<dyn LlmProvider>> = if groq.has_credentials() {
        let provider: Arc<dyn LlmProvider> = Arc::new(GroqProvider::from_config(groq)?);
        match provider.health_check().await {
            Ok(true) => tracing::info!(model = %config.analysis.model, "✓ Connected to Groq"),
            Ok(false) | Err(_) => tracing::warn!("⚠ Groq not reachable - analysis requests may fail"),
        }
        Some(provider)
    } else {
        tracing::warn!("⚠ GROQ_API_KEY not set - analysis disabled, data-only requests still work");
        None
    };

    if config.analysis.debug {
        tracing::info!(dir = %config.analysis.debug_dir.display(), "Debug artifacts enabled");
    }

    let analyst = MarketAnalyst::from_config(&config, provider);
    tracing::info!(source = analyst.source_name(), "Market data source ready");

    let app = router(AppState::new(analyst));

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 crypto-analyst server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health       - Health check");
    tracing::info!("  GET  /api/models   - List available models");
    tracing::info!("  POST /api/analyze  - Market data + trading analysis");

    axum::serve(listener, app).await?;

    Ok(())
}
