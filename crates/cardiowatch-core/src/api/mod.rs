//! REST API and live channel
//!
//! This module provides the HTTP surface for CardioWatch.

pub mod auth;
pub mod handlers;
pub mod live;
pub mod routes;

pub use handlers::AppState;
pub use live::start_heartbeat;
pub use routes::create_router;

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Error, Result};

/// HTTP API server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Router with tracing and CORS layers applied
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Serve until `shutdown` completes, then close every live session
    pub async fn serve<F>(self, addr: &str, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let registry = self.state.registry.clone();

        let listener = TcpListener::bind(addr).await?;
        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                let closed = registry.close_all();
                info!(closed, "Closing live sessions");
            })
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}
