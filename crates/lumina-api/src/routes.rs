//! API route definitions

use crate::handlers::{chat, documents, health, pages};
use crate::state::AppState;
use axum::{
    routing::{any, get},
    Router,
};
use std::sync::Arc;

/// Page, upload, chat and bookkeeping routes.
///
/// Upload and chat accept every method so that a wrong one gets the
/// route's own JSON error instead of a bare 405.
pub fn app_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(pages::index))
        .route("/static/js/main.js", get(pages::main_js))
        .route("/api/upload/", any(documents::upload_document))
        .route("/api/chat/", any(chat::chat))
        .route("/api/documents/", get(documents::list_documents))
        .route("/health", get(health::health_check))
}
