//! Router assembly: JSON API, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;
use crate::util::MAX_IMAGE_BYTES;

pub mod http;

/// Base64 of the largest accepted image plus room for the other JSON fields.
const BODY_LIMIT: usize = MAX_IMAGE_BYTES.div_ceil(3) * 4 + 64 * 1024;

/// Build the application router with:
/// - JSON API under `/api/...`
/// - Static SPA from `./static` with index fallback
/// - Request bodies up to `BODY_LIMIT` (image uploads exceed axum's 2 MB default)
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        .route("/api/health", get(http::http_health))
        .route("/api/login", post(http::http_post_login))
        .route("/api/analyze-image", post(http::http_post_analyze_image))
        .route("/api/generate-questions", post(http::http_post_generate_questions))
        .route("/api/evaluate-answer", post(http::http_post_evaluate_answer))
        .route("/api/auto-mode/assess", post(http::http_post_auto_mode_assess))
        .route("/api/explain", post(http::http_post_explain))
        .route("/api/models", post(http::http_post_models))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .fallback_service(static_service)
}
