// Router and server loop

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::downloader::tools::ToolManager;
use crate::downloader::Downloader;

/// Shared, immutable per-process state
#[derive(Clone)]
pub struct AppState {
    pub downloader: Arc<Downloader>,
    pub tools: Arc<ToolManager>,
}

impl AppState {
    pub fn new(downloader: Downloader, tools: ToolManager) -> Self {
        Self {
            downloader: Arc::new(downloader),
            tools: Arc::new(tools),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get_formats", post(handlers::get_formats))
        .route("/download", post(handlers::download))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn run_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("YouTube downloader listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
