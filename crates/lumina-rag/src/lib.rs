//! Lumina RAG - Retrieval-augmented answering
//!
//! Wires the pieces together:
//! - [`DocumentIngestor`] loads, splits, embeds and stores uploaded PDFs
//! - [`QueryOrchestrator`] embeds a question, retrieves the nearest chunks
//!   and asks the completion client for an answer grounded in them

use lumina_core::{CompletionError, LlmClient, Result, SearchHit};
use lumina_vector::{EmbeddingClient, VectorStore};
use std::sync::Arc;
use std::time::Instant;

pub mod ingest;
pub mod llm;

pub use ingest::{DocumentIngestor, IngestReport};
pub use llm::{
    create_llm_client, user_message, ChatCompletionClient, OllamaChatClient, ProbeOutcome,
    SYSTEM_PROMPT,
};

/// Separator placed between retrieved chunks in the prompt context
pub const CONTEXT_SEPARATOR: &str = "\n\n";

// ============================================================================
// Answer
// ============================================================================

/// Result of one question
#[derive(Debug, Clone)]
pub struct Answer {
    /// Completion text, or why the completion failed
    pub completion: std::result::Result<String, CompletionError>,

    /// Retrieved chunks, most similar first
    pub chunks: Vec<SearchHit>,

    /// Context block sent to the model
    pub context: String,
}

impl Answer {
    /// Text shown to the user; a failed completion renders as its message
    pub fn text(&self) -> String {
        match &self.completion {
            Ok(text) => text.clone(),
            Err(e) => e.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.completion.is_ok()
    }
}

/// Join chunk texts in retrieval order
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

// ============================================================================
// Query Orchestrator
// ============================================================================

/// Answers questions from the vector store and a completion client
pub struct QueryOrchestrator {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LlmClient>,
    top_k: usize,
}

impl QueryOrchestrator {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmClient>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            llm,
            top_k,
        }
    }

    /// Number of chunks retrieved per question
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `question`.
    ///
    /// Embedding and search failures are returned as errors. A failed
    /// completion is not: it is carried in [`Answer::completion`].
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let start = Instant::now();

        let query_vector = self.embedder.embed(question).await?;
        let chunks = self.store.search(&query_vector, self.top_k).await?;
        let context = build_context(&chunks);
        tracing::debug!(
            retrieved = chunks.len(),
            context_chars = context.len(),
            "Context assembled"
        );

        let completion = self.llm.complete(question, &context).await;
        match &completion {
            Ok(text) => tracing::info!(
                provider = self.llm.name(),
                answer_chars = text.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Answer generated"
            ),
            Err(e) => tracing::warn!(
                provider = self.llm.name(),
                kind = e.kind(),
                error = %e,
                "Completion failed"
            ),
        }

        Ok(Answer {
            completion,
            chunks,
            context,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
