//! HTTP surface
//!
//! Routes:
//! - GET  /health
//! - POST /generate/text, /generate/image
//! - POST /analyze/image
//! - GET  /download/{svg,metadata,image}/:id
//! - GET  /svg/:id
//! - GET  /blobs, /files
//! - POST /chat, /chat/reset
//! - GET  /chat/history

pub mod error;
pub mod handlers;

use crate::app::{App, MAX_BODY_BYTES};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the service router around a shared [`App`].
pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/generate/text", post(handlers::generate_text))
        .route("/generate/image", post(handlers::generate_image))
        .route("/analyze/image", post(handlers::analyze_image))
        .route("/download/svg/:id", get(handlers::download_svg))
        .route("/download/metadata/:id", get(handlers::download_metadata))
        .route("/download/image/:id", get(handlers::download_image))
        .route("/svg/:id", get(handlers::svg_url))
        .route("/blobs", get(handlers::list_blobs))
        .route("/files", get(handlers::list_blobs))
        .route("/chat", post(handlers::chat))
        .route("/chat/history", get(handlers::chat_history))
        .route("/chat/reset", post(handlers::reset_chat))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}
