//! Document upload and listing handlers

use crate::error::{AppError, ErrorResponse, UploadResponse};
use crate::state::AppState;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    http::Method,
    Json,
};
use chrono::{DateTime, Utc};
use lumina_core::UploadedDocument;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Multipart field carrying the PDF
const FILE_FIELD: &str = "file";

/// Document information
#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentInfo {
    /// Registry record ID
    pub id: Uuid,

    /// Stored file name
    #[schema(example = "6f1c..._handbook.pdf")]
    pub name: String,

    /// Path the upload was saved to
    pub file_path: String,

    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,

    /// Whether ingestion completed
    pub processed: bool,
}

impl From<UploadedDocument> for DocumentInfo {
    fn from(doc: UploadedDocument) -> Self {
        Self {
            id: doc.id,
            name: doc.display_name(),
            file_path: doc.file_path,
            uploaded_at: doc.uploaded_at,
            processed: doc.processed,
        }
    }
}

/// Document list response
#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentListResponse {
    /// Records, newest first
    pub documents: Vec<DocumentInfo>,

    /// Page size used
    pub limit: i64,

    /// Records skipped
    pub offset: i64,
}

/// Query parameters for document listing
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListDocumentsQuery {
    /// Items per page
    #[param(default = 50)]
    pub limit: Option<i64>,

    /// Records to skip
    #[param(default = 0)]
    pub offset: Option<i64>,
}

/// Upload a PDF, then index it before responding
#[utoipa::path(
    post,
    path = "/api/upload/",
    tag = "documents",
    request_body(content = Vec<u8>, content_type = "multipart/form-data", description = "PDF in a `file` field"),
    responses(
        (status = 200, description = "File uploaded and processed", body = UploadResponse),
        (status = 400, description = "Invalid request", body = UploadResponse),
        (status = 500, description = "Ingestion failed", body = UploadResponse)
    )
)]
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    method: Method,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    state.increment_requests();

    if method != Method::POST {
        return Err(AppError::InvalidUpload);
    }
    let mut multipart = multipart.map_err(|_| AppError::InvalidUpload)?;

    let (original_name, bytes) = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|_| AppError::InvalidUpload)?
            .ok_or(AppError::InvalidUpload)?;

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let name = field
            .file_name()
            .and_then(base_name)
            .ok_or(AppError::InvalidUpload)?;
        let bytes = field.bytes().await.map_err(|_| AppError::InvalidUpload)?;
        break (name, bytes);
    };

    let path = state
        .documents_dir()
        .join(format!("{}_{}", Uuid::new_v4(), original_name));
    save_upload(&path, &bytes)
        .await
        .map_err(|e| AppError::UploadFailed(e.to_string()))?;

    let record = state
        .registry
        .create(&path.display().to_string())
        .await
        .map_err(|e| AppError::UploadFailed(e.to_string()))?;
    tracing::info!(
        document_id = %record.id,
        path = %path.display(),
        bytes = bytes.len(),
        "Upload stored"
    );

    match state.ingestor.ingest(&path, Some(record.id)).await {
        Ok(report) => {
            state
                .registry
                .mark_processed(record.id)
                .await
                .map_err(|e| AppError::UploadFailed(e.to_string()))?;
            tracing::info!(
                document_id = %record.id,
                chunks = report.chunk_count,
                "Upload processed"
            );
            Ok(Json(UploadResponse::success(
                "File uploaded and processed successfully.",
            )))
        }
        Err(e) => {
            tracing::error!(document_id = %record.id, error = %e, "Ingestion failed");
            Err(AppError::UploadFailed(e.to_string()))
        }
    }
}

/// List uploaded documents
#[utoipa::path(
    get,
    path = "/api/documents/",
    tag = "documents",
    params(ListDocumentsQuery),
    responses(
        (status = 200, description = "Document list", body = DocumentListResponse),
        (status = 500, description = "Registry unavailable", body = ErrorResponse)
    )
)]
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListDocumentsQuery>,
) -> Result<Json<DocumentListResponse>, AppError> {
    state.increment_requests();

    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let offset = params.offset.unwrap_or(0).max(0);

    let documents = state
        .registry
        .list(limit, offset)
        .await?
        .into_iter()
        .map(DocumentInfo::from)
        .collect();

    Ok(Json(DocumentListResponse {
        documents,
        limit,
        offset,
    }))
}

/// Last path component of a client-supplied file name
fn base_name(name: &str) -> Option<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    match base {
        "" | "." | ".." => None,
        _ => Some(base.to_string()),
    }
}

async fn save_upload(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}
