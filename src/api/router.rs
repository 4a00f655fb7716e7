use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::auth::require_auth;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Public routes, no authentication
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // Read-only reporting, bearer token required when one is configured
    let protected = Router::new()
        .route("/api/users/:user_id/history", get(handlers::history::list))
        .route("/api/users/:user_id/logs", get(handlers::logs::list))
        .route("/api/users/:user_id/positions", get(handlers::positions::list))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
