//! Lumina Core - Domain models, traits, and shared types
//!
//! This crate defines the abstractions shared by the Lumina crates:
//! - Common error types
//! - Chunk metadata and search hits exchanged between store and orchestrator
//! - The completion client trait and its tagged failure type
//! - Configuration management
//! - The uploaded-document registry (SQLite)

pub mod config;
pub mod registry;

pub use config::{
    AppConfig, ConfigError, EmbeddingConfig, EmbeddingProvider, LlmConfig, LlmProvider,
    LoggingConfig, RagConfig, ServerConfig, StorageConfig, VectorBackend,
};
pub use registry::{DocumentRegistry, SqliteRegistry, UploadedDocument};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error type for Lumina operations
#[derive(Error, Debug)]
pub enum LuminaError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Document parse error: {0}")]
    Parse(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, LuminaError>;

/// Why a completion request did not produce an answer.
///
/// The `Display` form is what end users see in the chat window, so it keeps
/// the wording the chat page has always shown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// No API key configured for a provider that needs one.
    #[error("Error: {provider} API Key is missing.")]
    MissingCredential { provider: String },

    /// The request never produced an HTTP response.
    #[error("Error contacting AI: {0}")]
    Network(String),

    /// The upstream answered with a non-success status.
    #[error("Error contacting AI: {status} status from upstream. Response: {body}")]
    Upstream { status: u16, body: String },

    /// The upstream answered 2xx but the payload had no usable answer.
    #[error("Error contacting AI: {0}")]
    MalformedResponse(String),
}

impl CompletionError {
    /// Short machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => "missing_credential",
            Self::Network(_) => "network_error",
            Self::Upstream { .. } => "upstream_error",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }
}

// ============================================================================
// Chunk and Search Types
// ============================================================================

/// Metadata stored next to every chunk in the vector store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path of the file the chunk was extracted from
    pub source: String,

    /// 1-based page on which the chunk starts
    pub page: u32,

    /// Position of the chunk within its document
    pub chunk_index: u32,

    /// Registry record of the source document, when ingested through the API
    #[serde(default)]
    pub document_id: Option<Uuid>,
}

/// A chunk returned by similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Chunk text
    pub text: String,

    /// Similarity score (higher is closer)
    pub score: f32,

    /// Chunk metadata
    pub metadata: ChunkMetadata,
}

// ============================================================================
// Traits
// ============================================================================

/// Client for a hosted chat-completion model
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Answer `question` using `context` as the only grounding material
    async fn complete(
        &self,
        question: &str,
        context: &str,
    ) -> std::result::Result<String, CompletionError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================
