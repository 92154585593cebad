//! Key-value document storage behind the caches and the attempt log.
//!
//! Two backends exist: [`FileStore`] persists JSON documents under a data directory, and
//! [`MemoryStore`] keeps them in a process-local map that is lost on restart. The latter is a
//! degraded mode and reports itself as such through [`DocumentStore::mode`].

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt};

use crate::error::{LearnerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Persistent,
    Memory,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, key: &str) -> Result<Option<Value>>;

    /// Insert or replace the document stored under `key`.
    async fn upsert(&self, collection: &str, key: &str, doc: Value) -> Result<()>;

    /// Append to an unkeyed, insertion-ordered log.
    async fn append(&self, collection: &str, doc: Value) -> Result<()>;

    /// Everything appended to `collection`, oldest first.
    async fn entries(&self, collection: &str) -> Result<Vec<Value>>;

    fn mode(&self) -> StorageMode;
}

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("ytlearner")
}

/// Stable file-system safe name for an arbitrary key.
pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Default)]
struct MemoryCollection {
    keyed: HashMap<String, Value>,
    log: Vec<Value>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_collection<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut MemoryCollection) -> T,
    ) -> Result<T> {
        let mut guard = self.collections.lock().map_err(|_| LearnerError::Storage {
            reason: "memory store lock poisoned".to_string(),
        })?;
        Ok(f(guard.entry(collection.to_string()).or_default()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        self.with_collection(collection, |c| c.keyed.get(key).cloned())
    }

    async fn upsert(&self, collection: &str, key: &str, doc: Value) -> Result<()> {
        self.with_collection(collection, |c| {
            c.keyed.insert(key.to_string(), doc);
        })
    }

    async fn append(&self, collection: &str, doc: Value) -> Result<()> {
        self.with_collection(collection, |c| c.log.push(doc))
    }

    async fn entries(&self, collection: &str) -> Result<Vec<Value>> {
        self.with_collection(collection, |c| c.log.clone())
    }

    fn mode(&self) -> StorageMode {
        StorageMode::Memory
    }
}

/// JSON documents on disk: `<root>/<collection>/<sha256(key)>.json` for keyed documents and
/// `<root>/<collection>.jsonl` for appended logs.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(storage_err(&root))?;
        tracing::info!(root = %root.display(), "Opened persistent document store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn document_path(&self, collection: &str, key: &str) -> PathBuf {
        self.root
            .join(collection)
            .join(format!("{}.json", hash_key(key)))
    }

    fn log_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.jsonl", collection))
    }
}

fn storage_err(path: &Path) -> impl FnOnce(std::io::Error) -> LearnerError + '_ {
    move |e| LearnerError::Storage {
        reason: format!("{}: {}", path.display(), e),
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn find(&self, collection: &str, key: &str) -> Result<Option<Value>> {
        let path = self.document_path(collection, key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_err(&path)(e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn upsert(&self, collection: &str, key: &str, doc: Value) -> Result<()> {
        let path = self.document_path(collection, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(storage_err(parent))?;
        }

        // Write-then-rename so readers never see a half-written document.
        let tmp_path = path.with_extension("json.tmp");
        let pretty_json = serde_json::to_string_pretty(&doc)?;
        fs::write(&tmp_path, &pretty_json)
            .await
            .map_err(storage_err(&tmp_path))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(storage_err(&path))?;
        Ok(())
    }

    async fn append(&self, collection: &str, doc: Value) -> Result<()> {
        let path = self.log_path(collection);
        let mut line = serde_json::to_string(&doc)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(storage_err(&path))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(storage_err(&path))?;
        file.flush().await.map_err(storage_err(&path))?;
        Ok(())
    }

    async fn entries(&self, collection: &str) -> Result<Vec<Value>> {
        let path = self.log_path(collection);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_err(&path)(e)),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(LearnerError::from))
            .collect()
    }

    fn mode(&self) -> StorageMode {
        StorageMode::Persistent
    }
}
