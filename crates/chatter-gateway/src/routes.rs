//! Router assembly and shared handler state.

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::backend::Backend;
use crate::{proxy, relay};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: Backend,
    /// How long the relay waits for the next backend chunk before giving up.
    pub idle_timeout: Duration,
}

async fn healthz() -> &'static str {
    "ok"
}

/// Build the gateway router.
///
/// The static `/api/generate` route wins over the `/api/{endpoint}`
/// pass-through, so the answer stream is always handled by the relay.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/generate", post(relay::generate))
        .route(
            "/api/{endpoint}",
            get(proxy::proxy_get).post(proxy::proxy_post),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
