//! Durable storage of the task document.
//!
//! # Responsibilities
//! - Read the whole collection once at startup
//! - Overwrite the durable copy after every committed mutation
//! - Seed a fresh document when an operator asks for it
//!
//! # Design Decisions
//! - A missing or malformed document is an error, never an empty collection
//! - File writes go to a sibling temp file which is renamed over the target

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::store::task::TaskDocument;

/// Errors raised by a document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The durable document could not be read or is malformed.
    #[error("task store unavailable at {location}: {reason}")]
    Unavailable { location: String, reason: String },

    /// Writing the durable document failed.
    #[error("failed to persist task store at {location}: {source}")]
    Persist {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode task document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Storage backend holding the canonical copy of the task document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the durable document.
    async fn load(&self) -> Result<TaskDocument, StoreError>;

    /// Replace the durable document with `document`.
    async fn persist(&self, document: &TaskDocument) -> Result<(), StoreError>;

    /// Human readable location for logs.
    fn location(&self) -> String;
}

/// A JSON file on local disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the default collection if no document exists yet.
    ///
    /// Returns `true` when a document was written.
    pub async fn seed_if_missing(&self) -> Result<bool, StoreError> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.persist_error(source))?;
        }
        self.persist(&TaskDocument::seed()).await?;
        tracing::info!(path = %self.path.display(), "Seeded task store");
        Ok(true)
    }

    fn unavailable(&self, reason: impl ToString) -> StoreError {
        StoreError::Unavailable {
            location: self.location(),
            reason: reason.to_string(),
        }
    }

    fn persist_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Persist {
            location: self.location(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn load(&self) -> Result<TaskDocument, StoreError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.unavailable(e))?;
        let document: TaskDocument =
            serde_json::from_slice(&bytes).map_err(|e| self.unavailable(e))?;

        let dupes = document.duplicate_ids();
        if !dupes.is_empty() {
            return Err(self.unavailable(format!("duplicate task ids {:?}", dupes)));
        }

        tracing::info!(
            path = %self.path.display(),
            tasks = document.tasks.len(),
            "Loaded task store"
        );
        Ok(document)
    }

    async fn persist(&self, document: &TaskDocument) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(document)?;
        let temp_path = self.temp_path();

        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| self.persist_error(e))?;
        file.write_all(&json).await.map_err(|e| self.persist_error(e))?;
        file.sync_all().await.map_err(|e| self.persist_error(e))?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.persist_error(e))?;

        tracing::debug!(
            path = %self.path.display(),
            tasks = document.tasks.len(),
            "Persisted task store"
        );
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<TaskDocument>>,
    persist_count: AtomicUsize,
    fail_persist: AtomicBool,
}

impl MemoryStore {
    /// A store that already holds `document`.
    pub fn with_document(document: TaskDocument) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            ..Self::default()
        }
    }

    /// The document as last persisted.
    pub fn snapshot(&self) -> Option<TaskDocument> {
        self.document
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of successful persists so far.
    pub fn persist_count(&self) -> usize {
        self.persist_count.load(Ordering::SeqCst)
    }

    /// Make subsequent persists fail.
    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self) -> Result<TaskDocument, StoreError> {
        self.snapshot().ok_or_else(|| StoreError::Unavailable {
            location: self.location(),
            reason: "no document".to_string(),
        })
    }

    async fn persist(&self, document: &TaskDocument) -> Result<(), StoreError> {
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(StoreError::Persist {
                location: self.location(),
                source: std::io::Error::other("persistence disabled"),
            });
        }
        *self.document.lock().unwrap_or_else(|e| e.into_inner()) = Some(document.clone());
        self.persist_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
