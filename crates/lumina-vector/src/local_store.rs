//! On-disk vector store
//!
//! The whole collection lives in a single JSON file under the store
//! directory. Writers take an exclusive lock on a sibling lock file, re-read
//! the collection, apply their change and replace the file through a rename,
//! so several processes can share one directory and a document's batch is
//! either fully on disk or not at all. Readers serve from an in-memory copy
//! that is reloaded whenever the file changes underneath it.

use async_trait::async_trait;
use fs2::FileExt;
use lumina_core::{LuminaError, Result, SearchHit};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs::{File, Metadata, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{check_dimension, cosine_similarity, VectorEntry, VectorStore};

const COLLECTION_FILE: &str = "collection.json";
const LOCK_FILE: &str = "collection.lock";

/// Serialized form of the collection
#[derive(Debug, Deserialize)]
struct StoredCollection {
    embedding_model: String,
    dimension: usize,
    #[serde(default)]
    entries: Vec<VectorEntry>,
}

#[derive(Serialize)]
struct CollectionRef<'a> {
    embedding_model: &'a str,
    dimension: usize,
    entries: &'a [VectorEntry],
}

/// Identifies one version of the collection file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

fn stamp_of(meta: std::io::Result<Metadata>) -> Result<Option<FileStamp>> {
    match meta {
        Ok(meta) => Ok(Some(FileStamp {
            modified: meta.modified().ok(),
            len: meta.len(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Entries as of one version of the file
#[derive(Debug, Default)]
struct Snapshot {
    entries: Vec<VectorEntry>,
    stamp: Option<FileStamp>,
}

/// Blocking access to the collection file and its lock
#[derive(Debug, Clone)]
struct CollectionFile {
    path: PathBuf,
    lock_path: PathBuf,
    model_id: String,
    dimension: usize,
}

impl CollectionFile {
    /// Lock held until the returned handle is dropped
    fn lock(&self, exclusive: bool) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(file)
    }

    /// Caller must hold the lock
    fn read(&self) -> Result<Snapshot> {
        let stamp = stamp_of(std::fs::metadata(&self.path))?;
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredCollection = serde_json::from_slice(&bytes).map_err(|e| {
            LuminaError::VectorStore(format!(
                "Corrupt collection file {}: {e}",
                self.path.display()
            ))
        })?;

        if stored.embedding_model != self.model_id || stored.dimension != self.dimension {
            return Err(LuminaError::VectorStore(format!(
                "Collection at {} was built with {} ({} dims); current embedder is {} ({} dims)",
                self.path.display(),
                stored.embedding_model,
                stored.dimension,
                self.model_id,
                self.dimension
            )));
        }

        Ok(Snapshot {
            entries: stored.entries,
            stamp,
        })
    }

    /// Caller must hold the exclusive lock
    fn write(&self, entries: &[VectorEntry]) -> Result<Option<FileStamp>> {
        let body = serde_json::to_vec(&CollectionRef {
            embedding_model: &self.model_id,
            dimension: self.dimension,
            entries,
        })
        .map_err(|e| LuminaError::VectorStore(format!("Failed to serialize collection: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        stamp_of(std::fs::metadata(&self.path))
    }

    fn load(&self) -> Result<Snapshot> {
        let _lock = self.lock(false)?;
        self.read()
    }

    fn append(&self, new_entries: Vec<VectorEntry>) -> Result<Snapshot> {
        let _lock = self.lock(true)?;
        let mut snapshot = self.read()?;
        snapshot.entries.extend(new_entries);
        snapshot.stamp = self.write(&snapshot.entries)?;
        Ok(snapshot)
    }

    fn remove_document(&self, document_id: Uuid) -> Result<(Snapshot, usize)> {
        let _lock = self.lock(true)?;
        let mut snapshot = self.read()?;
        let before = snapshot.entries.len();
        snapshot
            .entries
            .retain(|e| e.metadata.document_id != Some(document_id));

        let removed = before - snapshot.entries.len();
        if removed > 0 {
            snapshot.stamp = self.write(&snapshot.entries)?;
        }
        Ok((snapshot, removed))
    }
}

async fn run_blocking<T, F>(file: CollectionFile, op: F) -> Result<T>
where
    F: FnOnce(CollectionFile) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || op(file))
        .await
        .map_err(|e| LuminaError::VectorStore(format!("Collection task failed: {e}")))?
}

/// File-backed store using brute-force cosine search
pub struct LocalVectorStore {
    file: CollectionFile,
    snapshot: RwLock<Snapshot>,
}

impl LocalVectorStore {
    /// Open the store in `dir`, creating the directory if needed.
    ///
    /// An existing collection built with another embedding model or
    /// dimension is rejected rather than mixed with new vectors.
    pub async fn open(dir: &Path, model_id: &str, dimension: usize) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let file = CollectionFile {
            path: dir.join(COLLECTION_FILE),
            lock_path: dir.join(LOCK_FILE),
            model_id: model_id.to_string(),
            dimension,
        };

        let snapshot = run_blocking(file.clone(), |file| file.load()).await?;

        tracing::info!(
            path = %file.path.display(),
            entries = snapshot.entries.len(),
            model = model_id,
            "Opened local vector store"
        );

        Ok(Self {
            file,
            snapshot: RwLock::new(snapshot),
        })
    }

    /// Location of the collection file
    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Reload the in-memory copy if another handle rewrote the file
    async fn refresh(&self) -> Result<()> {
        let current = stamp_of(tokio::fs::metadata(&self.file.path).await)?;
        if self.snapshot.read().await.stamp == current {
            return Ok(());
        }

        let mut snapshot = self.snapshot.write().await;
        if snapshot.stamp == current {
            return Ok(());
        }
        *snapshot = run_blocking(self.file.clone(), |file| file.load()).await?;
        tracing::debug!(
            entries = snapshot.entries.len(),
            "Reloaded local collection changed on disk"
        );
        Ok(())
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn add(&self, new_entries: Vec<VectorEntry>) -> Result<usize> {
        if new_entries.is_empty() {
            return Ok(0);
        }
        for entry in &new_entries {
            check_dimension(&entry.vector, self.file.dimension)?;
        }

        let added = new_entries.len();
        let mut snapshot = self.snapshot.write().await;
        *snapshot = run_blocking(self.file.clone(), move |file| file.append(new_entries)).await?;

        tracing::debug!(added, total = snapshot.entries.len(), "Persisted local collection");
        Ok(added)
    }

    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        check_dimension(query_vector, self.file.dimension)?;
        self.refresh().await?;

        let snapshot = self.snapshot.read().await;
        let mut scored: Vec<(f32, &VectorEntry)> = snapshot
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_vector, &e.vector), e))
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, entry)| SearchHit {
                text: entry.text.clone(),
                score,
                metadata: entry.metadata.clone(),
            })
            .collect())
    }

    async fn delete_by_document(&self, document_id: Uuid) -> Result<u64> {
        let mut snapshot = self.snapshot.write().await;
        let (fresh, removed) =
            run_blocking(self.file.clone(), move |file| file.remove_document(document_id)).await?;
        *snapshot = fresh;
        Ok(removed as u64)
    }

    async fn count(&self) -> Result<usize> {
        self.refresh().await?;
        Ok(self.snapshot.read().await.entries.len())
    }

    fn name(&self) -> &str {
        "local"
    }
}
