use std::env;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use mentor_rag::core::config::AppPaths;
use mentor_rag::core::logging;
use mentor_rag::server;
use mentor_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);
    let state = AppState::initialize(paths).await?;

    let host = env::var("MENTOR_RAG_HOST")
        .ok()
        .or_else(|| {
            state.config.load_config().ok().and_then(|cfg| {
                cfg.get("server")
                    .and_then(|s| s.get("host"))
                    .and_then(|h| h.as_str())
                    .map(|h| h.to_string())
            })
        })
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(0);
    let bind_addr = format!("{}:{}", host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("MENTOR_RAG_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
