use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::transcribe;
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router with protected routes
///
/// Note: Authentication middleware should be applied in main.rs after state is available
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Protected routes (auth required when AUTH_REQUIRED=true)
        .route(
            "/transcribe",
            get(transcribe::transcribe_get).post(transcribe::transcribe_post),
        )
        .layer(TraceLayer::new_for_http())
}
