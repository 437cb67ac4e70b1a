//! Health check endpoint.

use axum::{Router, routing::get};

use crate::state::AppState;

/// Liveness probe. Needs no session.
pub async fn health() -> &'static str {
    "OK"
}

/// Create health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/healthz", get(health))
}
