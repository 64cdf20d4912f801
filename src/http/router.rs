//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the API router with versioned endpoints
    let api_v1 = Router::new()
        // Tutor configuration
        .route("/settings", get(handlers::get_settings))
        .route("/settings", put(handlers::put_settings))
        // Booking request negotiation
        .route("/requests", post(handlers::submit_request))
        .route("/requests", get(handlers::list_requests))
        .route("/requests/{request_id}/accept", post(handlers::accept_request))
        .route("/requests/{request_id}/decline", post(handlers::decline_request))
        .route("/requests/{request_id}/counter", post(handlers::counter_request))
        // Lesson lifecycle
        .route("/lessons", get(handlers::list_lessons))
        .route("/lessons/{lesson_id}/cancel", post(handlers::cancel_lesson))
        .route("/lessons/{lesson_id}/status", put(handlers::set_lesson_status))
        .route("/lessons/{lesson_id}/no-show", post(handlers::register_no_show))
        .route("/lessons/{lesson_id}/time", put(handlers::update_lesson_time))
        // Credit packages
        .route("/students/{student_id}/package", get(handlers::get_active_package))
        .route("/students/{student_id}/package", post(handlers::grant_package))
        .route("/students/{student_id}/package", delete(handlers::remove_package));

    // Combine all routes
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RepositoryFactory;

    #[tokio::test]
    async fn router_builds_with_local_repository() {
        let state = AppState::new(RepositoryFactory::create_local());
        let _router = create_router(state);
    }
}
