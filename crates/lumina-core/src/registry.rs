//! SQLite document registry
//!
//! Records which files were uploaded, when, and whether ingestion finished.
//! Retrieval never consults it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use crate::{LuminaError, Result};

/// An uploaded file and its ingestion state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedDocument {
    /// Unique identifier
    pub id: Uuid,

    /// Where the uploaded file was stored
    pub file_path: String,

    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,

    /// Set once ingestion returned without error
    pub processed: bool,
}

impl UploadedDocument {
    /// Create a fresh, unprocessed record
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_path: file_path.into(),
            uploaded_at: Utc::now(),
            processed: false,
        }
    }

    /// Base name of the stored file
    pub fn display_name(&self) -> String {
        Path::new(&self.file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_path.clone())
    }
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    file_path: String,
    uploaded_at: DateTime<Utc>,
    processed: bool,
}

impl From<DocumentRow> for UploadedDocument {
    fn from(row: DocumentRow) -> Self {
        Self {
            id: row.id,
            file_path: row.file_path,
            uploaded_at: row.uploaded_at,
            processed: row.processed,
        }
    }
}

/// Trait for document record operations
#[async_trait]
pub trait DocumentRegistry: Send + Sync {
    /// Record a newly uploaded file
    async fn create(&self, file_path: &str) -> Result<UploadedDocument>;

    /// Flag a document as fully ingested
    async fn mark_processed(&self, id: Uuid) -> Result<()>;

    /// Get a record by ID
    async fn get(&self, id: Uuid) -> Result<Option<UploadedDocument>>;

    /// List records, newest first
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<UploadedDocument>>;
}

/// SQLite-backed registry
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    /// Connect and make sure the records table exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| LuminaError::Database(format!("Invalid database URL: {e}")))?
            .create_if_missing(true);

        // Every connection to `:memory:` opens its own database, so keep exactly one alive
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| LuminaError::Database(format!("SQLite connection failed: {e}")))?;

        let registry = Self { pool };
        registry.migrate().await?;
        tracing::debug!(url = %database_url, "Document registry ready");
        Ok(registry)
    }

    /// Create from an existing pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS uploaded_documents (
                id BLOB PRIMARY KEY NOT NULL,
                file_path TEXT NOT NULL,
                uploaded_at TEXT NOT NULL,
                processed BOOLEAN NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LuminaError::Database(format!("Failed to create table: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl DocumentRegistry for SqliteRegistry {
    async fn create(&self, file_path: &str) -> Result<UploadedDocument> {
        let doc = UploadedDocument::new(file_path);

        sqlx::query(
            r#"
            INSERT INTO uploaded_documents (id, file_path, uploaded_at, processed)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(doc.id)
        .bind(&doc.file_path)
        .bind(doc.uploaded_at)
        .bind(doc.processed)
        .execute(&self.pool)
        .await
        .map_err(|e| LuminaError::Database(format!("Failed to create document: {e}")))?;

        Ok(doc)
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("UPDATE uploaded_documents SET processed = 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| LuminaError::Database(format!("Failed to update document: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(LuminaError::NotFound(format!("document {id}")));
        }

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadedDocument>> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, file_path, uploaded_at, processed
            FROM uploaded_documents
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LuminaError::Database(format!("Failed to get document: {e}")))?;

        Ok(row.map(UploadedDocument::from))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<UploadedDocument>> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            r#"
            SELECT id, file_path, uploaded_at, processed
            FROM uploaded_documents
            ORDER BY uploaded_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LuminaError::Database(format!("Failed to list documents: {e}")))?;

        Ok(rows.into_iter().map(UploadedDocument::from).collect())
    }
}
