//! Document ingestion: load, split, embed, store
//!
//! A document's chunks are embedded in one batch and handed to the vector
//! store in a single `add`, so the store sees the whole document or nothing.

use lumina_core::{ChunkMetadata, LuminaError, RagConfig, Result};
use lumina_parser::{DocumentParser, ParsedDocument, PdfParser, SlidingWindowSplitter};
use lumina_vector::{EmbeddingClient, VectorEntry, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// What one ingestion run produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub chunk_count: usize,
    pub page_count: usize,
}

/// Runs the load/split/embed/store pipeline for one document at a time
pub struct DocumentIngestor {
    parser: Arc<dyn DocumentParser>,
    splitter: SlidingWindowSplitter,
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
}

impl DocumentIngestor {
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        splitter: SlidingWindowSplitter,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            parser,
            splitter,
            embedder,
            store,
        }
    }

    /// PDF ingestor with the configured window
    pub fn from_config(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let splitter = SlidingWindowSplitter::new(config.chunk_size, config.chunk_overlap)
            .map_err(|e| LuminaError::Config(e.to_string()))?;
        Ok(Self::new(Arc::new(PdfParser::new()), splitter, embedder, store))
    }

    /// Ingest the file at `path`, tagging chunks with `document_id` when given
    pub async fn ingest(&self, path: &Path, document_id: Option<Uuid>) -> Result<IngestReport> {
        let start = Instant::now();
        tracing::info!(path = %path.display(), "Ingesting document");

        let document = self.load(path.to_path_buf()).await?;
        if !document.has_text() {
            return Err(LuminaError::Validation(format!(
                "no extractable text in {}",
                path.display()
            )));
        }

        let chunks = self.splitter.split_document(&document);
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();

        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(LuminaError::Embedding(format!(
                "embedded {} of {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let entries: Vec<VectorEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                VectorEntry::new(
                    vector,
                    chunk.content,
                    ChunkMetadata {
                        source: document.source.clone(),
                        page: chunk.page,
                        chunk_index: chunk.index,
                        document_id,
                    },
                )
            })
            .collect();

        let chunk_count = self.store.add(entries).await?;

        let report = IngestReport {
            chunk_count,
            page_count: document.page_count(),
        };
        tracing::info!(
            path = %path.display(),
            pages = report.page_count,
            chunks = report.chunk_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Document ingested"
        );
        Ok(report)
    }

    async fn load(&self, path: PathBuf) -> Result<ParsedDocument> {
        let parser = self.parser.clone();
        tokio::task::spawn_blocking(move || parser.parse(&path))
            .await
            .map_err(|e| LuminaError::Other(anyhow::anyhow!("parser task failed: {e}")))?
            .map_err(|e| LuminaError::Parse(e.to_string()))
    }
}
