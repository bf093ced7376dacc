use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the service router. Metrics and CORS are layered on by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::preview::get_preview))
        .route("/health", get(handlers::health_check))
        .fallback(handlers::preview::not_supported)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
