use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::server::{handlers, AppState};

/// Build the HTTP router
///
/// Exported segments are served from the output directory under the
/// configured public prefix.
pub fn create_router(state: AppState) -> Router {
    let storage = &state.config.storage;
    let prefix = storage.public_prefix.trim_end_matches('/').to_string();
    let exports = ServeDir::new(&storage.output_dir);
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/analyze_video", post(handlers::analyze_video))
        .route("/health", get(handlers::health))
        .nest_service(&prefix, exports)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
