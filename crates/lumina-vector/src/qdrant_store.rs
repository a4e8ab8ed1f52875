//! Qdrant implementation for vector storage
//!
//! Each chunk becomes one point whose payload carries the chunk text and its
//! metadata. A document's chunks go up in a single upsert.

use async_trait::async_trait;
use lumina_core::{ChunkMetadata, LuminaError, Result, SearchHit};
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointId, PointStruct, PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::{check_dimension, VectorEntry, VectorStore};

/// Qdrant vector store implementation
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    /// Build a client; no request is made until the first operation
    pub fn new(url: &str, collection: &str, dimension: usize) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| LuminaError::VectorStore(format!("Qdrant connection failed: {e}")))?;

        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension,
        })
    }

    /// Create the collection if it does not exist yet
    pub async fn init_collection(&self) -> Result<()> {
        let collections = self.client.list_collections().await.map_err(|e| {
            LuminaError::VectorStore(format!("Failed to list collections: {e}"))
        })?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);

        if !exists {
            tracing::info!(
                collection = %self.collection,
                dimension = self.dimension,
                "Creating Qdrant collection"
            );
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                    ),
                )
                .await
                .map_err(|e| {
                    LuminaError::VectorStore(format!("Failed to create collection: {e}"))
                })?;
        }

        Ok(())
    }

    fn to_point(entry: VectorEntry) -> Result<PointStruct> {
        let payload = PointPayload {
            content: entry.text,
            source: entry.metadata.source,
            page: entry.metadata.page,
            chunk_index: entry.metadata.chunk_index,
            document_id: entry.metadata.document_id.map(|id| id.to_string()),
        };

        let payload_map: HashMap<String, qdrant_client::qdrant::Value> =
            match serde_json::to_value(&payload)
                .map_err(|e| LuminaError::VectorStore(format!("Invalid payload: {e}")))?
            {
                serde_json::Value::Object(map) => {
                    map.into_iter().map(|(k, v)| (k, v.into())).collect()
                }
                _ => HashMap::new(),
            };

        Ok(PointStruct::new(
            entry.id.to_string(),
            entry.vector,
            payload_map,
        ))
    }
}

/// Payload stored with each vector
#[derive(Debug, Serialize)]
struct PointPayload {
    content: String,
    source: String,
    page: u32,
    chunk_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    document_id: Option<String>,
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn add(&self, entries: Vec<VectorEntry>) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }
        for entry in &entries {
            check_dimension(&entry.vector, self.dimension)?;
        }

        let ids: Vec<PointId> = entries.iter().map(|e| e.id.to_string().into()).collect();
        let count = entries.len();
        let points = entries
            .into_iter()
            .map(Self::to_point)
            .collect::<Result<Vec<_>>>()?;

        let upsert = self
            .client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await;

        if let Err(e) = upsert {
            // A failed batch may still have landed partially; remove whatever did
            let rollback = self
                .client
                .delete_points(
                    DeletePointsBuilder::new(&self.collection)
                        .points(PointsIdsList { ids })
                        .wait(true),
                )
                .await;
            if let Err(rollback_err) = rollback {
                tracing::error!(error = %rollback_err, "Qdrant rollback failed");
            }
            return Err(LuminaError::VectorStore(format!(
                "Failed to upsert vectors: {e}"
            )));
        }

        tracing::debug!(collection = %self.collection, count, "Upserted points");
        Ok(count)
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        check_dimension(query_vector, self.dimension)?;

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, query_vector.to_vec(), limit as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| LuminaError::VectorStore(format!("Vector search failed: {e}")))?;

        let hits = results
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let text_field = |key: &str| {
                    payload
                        .get(key)
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string())
                };
                let int_field = |key: &str| {
                    payload
                        .get(key)
                        .and_then(|v| v.as_integer())
                        .and_then(|n| u32::try_from(n).ok())
                        .unwrap_or_default()
                };

                SearchHit {
                    text: text_field("content").unwrap_or_default(),
                    score: point.score,
                    metadata: ChunkMetadata {
                        source: text_field("source").unwrap_or_default(),
                        page: int_field("page"),
                        chunk_index: int_field("chunk_index"),
                        document_id: text_field("document_id")
                            .and_then(|s| Uuid::parse_str(&s).ok()),
                    },
                }
            })
            .collect();

        Ok(hits)
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<u64> {
        let filter = Filter::must([Condition::matches("document_id", document_id.to_string())]);

        let matching = self
            .client
            .count(
                CountPointsBuilder::new(&self.collection)
                    .filter(filter.clone())
                    .exact(true),
            )
            .await
            .map_err(|e| LuminaError::VectorStore(format!("Failed to count vectors: {e}")))?
            .result
            .map(|r| r.count)
            .unwrap_or_default();

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(filter)
                    .wait(true),
            )
            .await
            .map_err(|e| LuminaError::VectorStore(format!("Failed to delete vectors: {e}")))?;

        Ok(matching)
    }

    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| LuminaError::VectorStore(format!("Failed to count vectors: {e}")))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or_default())
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_payload_omits_missing_document_id() {
        let payload = PointPayload {
            content: "text".to_string(),
            source: "a.pdf".to_string(),
            page: 1,
            chunk_index: 0,
            document_id: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert!(value.get("document_id").is_none());
        assert_eq!(value["page"], 1);
    }

    #[test]
    fn test_client_builds_without_server() {
        let store = QdrantStore::new("http://localhost:6334", "lumina_test", 384).unwrap();
        assert_eq!(store.name(), "qdrant");
    }
}
