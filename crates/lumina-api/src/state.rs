//! Application state management

use lumina_core::config::AppConfig;
use lumina_core::{DocumentRegistry, LlmProvider, Result, SqliteRegistry};
use lumina_rag::{create_llm_client, DocumentIngestor, QueryOrchestrator};
use lumina_vector::{create_embedding_client, open_vector_store, VectorStore};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Request counter
    pub request_count: AtomicU64,
    /// Uploaded-document records
    pub registry: Arc<dyn DocumentRegistry>,
    /// Vector store shared by ingestion and retrieval
    pub vector_store: Arc<dyn VectorStore>,
    /// Load/split/embed/store pipeline
    pub ingestor: Arc<DocumentIngestor>,
    /// Question answering
    pub orchestrator: Arc<QueryOrchestrator>,
}

impl AppState {
    /// Assemble state from already constructed services
    pub fn new(
        config: AppConfig,
        registry: Arc<dyn DocumentRegistry>,
        vector_store: Arc<dyn VectorStore>,
        ingestor: Arc<DocumentIngestor>,
        orchestrator: Arc<QueryOrchestrator>,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            registry,
            vector_store,
            ingestor,
            orchestrator,
        }
    }

    /// Construct every service described by `config`
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.storage.documents_dir).await?;

        let registry = SqliteRegistry::connect(&config.storage.database_url).await?;

        let embedder = create_embedding_client(&config.embedding, &config.llm)?;
        let vector_store = open_vector_store(&config, embedder.as_ref()).await?;
        tracing::info!(
            backend = vector_store.name(),
            embedding_model = embedder.model_id(),
            dimension = embedder.dimension(),
            "Vector store ready"
        );

        let llm = create_llm_client(&config.llm)?;
        if config.llm.api_key().is_none() && config.llm.provider != LlmProvider::Ollama {
            tracing::warn!(
                provider = config.llm.provider.display_name(),
                "No API key configured; chat answers will report the missing key"
            );
        }

        let ingestor = DocumentIngestor::from_config(
            &config.rag,
            embedder.clone(),
            vector_store.clone(),
        )?;
        let orchestrator =
            QueryOrchestrator::new(embedder, vector_store.clone(), llm, config.rag.top_k);

        Ok(Self::new(
            config,
            Arc::new(registry),
            vector_store,
            Arc::new(ingestor),
            Arc::new(orchestrator),
        ))
    }

    /// Directory uploaded files are written to
    pub fn documents_dir(&self) -> &Path {
        &self.config.storage.documents_dir
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    /// Get total request count
    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
