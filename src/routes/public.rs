use crate::AppState;
use axum::{Router, routing::get};

/// Public Router Module
///
/// Unauthenticated infrastructure endpoints. These are merged outside the
/// authentication and role-guard layers.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and monitoring.
        .route("/health", get(|| async { "ok" }))
}
