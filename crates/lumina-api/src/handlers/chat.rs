//! Chat handler

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::Method,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Chat request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// The user's question
    #[schema(example = "How many vacation days do I get?")]
    pub query: Option<String>,
}

/// Chat response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    /// Model answer, or the reason the model could not be reached
    pub answer: String,
}

/// Extract a non-blank question from a raw request body
fn parse_query(body: &[u8]) -> Option<String> {
    let request: ChatRequest = serde_json::from_slice(body).ok()?;
    request.query.filter(|q| !q.trim().is_empty())
}

/// Answer a question from the indexed documents.
///
/// Upstream completion failures still answer 200; the failure text is the
/// answer.
#[utoipa::path(
    post,
    path = "/api/chat/",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Answer", body = ChatResponse),
        (status = 400, description = "No query provided", body = ErrorResponse),
        (status = 405, description = "Invalid method", body = ErrorResponse),
        (status = 413, description = "Body too large", body = ErrorResponse),
        (status = 500, description = "Retrieval failed", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    state.increment_requests();

    if method != Method::POST {
        return Err(AppError::InvalidMethod);
    }

    let body = body.map_err(|rejection| AppError::BodyRejected {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;
    let query = parse_query(&body).ok_or(AppError::NoQuery)?;

    let answer = state.orchestrator.answer(&query).await.map_err(|e| {
        tracing::error!(error = %e, "Retrieval failed");
        AppError::from(e)
    })?;

    Ok(Json(ChatResponse {
        answer: answer.text(),
    }))
}
