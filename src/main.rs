use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use contas_rag::core::config::AppPaths;
use contas_rag::logging;
use contas_rag::server;
use contas_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let state = AppState::initialize(paths)
        .await
        .context("Failed to initialize application state")?;

    if state.settings.rag.warm_up_on_start {
        if let Some(pipeline) = state.pipeline.clone() {
            tokio::spawn(async move {
                if let Err(err) = pipeline.warm_up().await {
                    tracing::warn!(
                        "RAG warm-up failed, caches will fill on first request: {}",
                        err
                    );
                }
            });
        }
    }

    let bind_addr = format!("{}:{}", state.settings.server.host, state.settings.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
