//! Glyphgate API: WebSocket front end for the session coordinator.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod engine;
pub mod error;
pub mod routes;
pub mod state;

/// Builds the application router with every route mounted.
pub fn build_router(app_state: state::AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::ws::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
