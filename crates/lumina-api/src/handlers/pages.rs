//! Chat page and its script, compiled into the binary

use axum::{
    http::header,
    response::{Html, IntoResponse},
};

const INDEX_HTML: &str = include_str!("../../static/index.html");
const MAIN_JS: &str = include_str!("../../static/main.js");

/// Chat page
#[utoipa::path(
    get,
    path = "/",
    tag = "pages",
    responses((status = 200, description = "Chat page", body = String, content_type = "text/html"))
)]
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn main_js() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        MAIN_JS,
    )
}
