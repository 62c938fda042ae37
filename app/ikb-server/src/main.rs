mod routes;

use anyhow::Context;
use ikb_rag::{RagConfig, RagEngine};
use std::sync::Arc;

use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = RagConfig::load().context("Failed to load configuration")?;
    let engine = RagEngine::from_config(&config).context("Failed to initialize RAG engine")?;

    let state = AppState {
        engine: Arc::new(engine),
        request_timeout: config.server.request_timeout(),
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!("ikb server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
