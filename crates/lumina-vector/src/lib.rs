//! Lumina Vector - Embeddings and vector storage
//!
//! Provides the embedding providers used for both chunks and questions,
//! and the stores that keep (vector, text, metadata) entries and answer
//! nearest-neighbour queries.

use async_trait::async_trait;
use lumina_core::{
    AppConfig, ChunkMetadata, LuminaError, Result, SearchHit, VectorBackend,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub mod embedding;
pub mod local_store;
pub mod qdrant_store;

pub use embedding::{
    create_embedding_client, EmbeddingClient, HashingEmbedding, OllamaEmbedding, OpenAiEmbedding,
};
pub use local_store::LocalVectorStore;
pub use qdrant_store::QdrantStore;

/// A stored chunk: its vector, text and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl VectorEntry {
    pub fn new(vector: Vec<f32>, text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            text: text.into(),
            metadata,
        }
    }
}

/// Trait for vector database operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append a batch of entries; the batch is committed as a whole or not at all
    async fn add(&self, entries: Vec<VectorEntry>) -> Result<usize>;

    /// Nearest entries to `query_vector`, most similar first
    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchHit>>;

    /// Delete entries by document ID
    async fn delete_by_document(&self, document_id: Uuid) -> Result<u64>;

    /// Number of stored entries
    async fn count(&self) -> Result<usize>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Open the vector store selected in the configuration
pub async fn open_vector_store(
    config: &AppConfig,
    embedder: &dyn EmbeddingClient,
) -> Result<Arc<dyn VectorStore>> {
    match config.storage.vector_backend {
        VectorBackend::Local => {
            let store = LocalVectorStore::open(
                &config.storage.vector_store_dir,
                embedder.model_id(),
                embedder.dimension(),
            )
            .await?;
            Ok(Arc::new(store))
        }
        VectorBackend::Qdrant => {
            let store = QdrantStore::new(
                &config.storage.qdrant_url,
                &config.storage.qdrant_collection,
                embedder.dimension(),
            )?;
            store.init_collection().await?;
            Ok(Arc::new(store))
        }
    }
}

/// Cosine similarity; zero vectors are dissimilar to everything
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

pub(crate) fn check_dimension(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(LuminaError::VectorStore(format!(
            "vector has dimension {}, store expects {expected}",
            vector.len()
        )));
    }
    Ok(())
}
