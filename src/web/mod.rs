//! Web server module: the thin query/trigger surface the dashboard consumes.

mod handlers;

pub use handlers::*;

use crate::cache::CacheLayer;
use crate::db::Store;
use crate::remediation::RemediationController;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub cache: Arc<CacheLayer>,
    pub controller: Arc<RemediationController>,
}

/// Query/trigger server. Lives independently of the monitoring loop so
/// `/health` reports process liveness even while the network is down.
pub struct Server {
    state: AppState,
    port: u16,
}

impl Server {
    pub fn new(
        store: Store,
        cache: Arc<CacheLayer>,
        controller: Arc<RemediationController>,
        port: u16,
    ) -> Self {
        Self {
            state: AppState {
                store,
                cache,
                controller,
            },
            port,
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/health", get(handlers::handle_health))
            .route("/api/status", get(handlers::handle_status))
            .route("/api/samples", get(handlers::handle_get_samples))
            .route("/api/events", get(handlers::handle_get_events))
            .route("/api/remediate", post(handlers::handle_remediate))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until the process exits.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.routes();

        tracing::info!("web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
