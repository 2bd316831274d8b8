use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored metadata is not valid JSON: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
}

/// Object store backed by a directory on local disk. Keys use `/`
/// separators and map directly onto subdirectories under the root.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if !root.exists() {
            fs::create_dir_all(&root).await?;
        }
        Ok(Self { root })
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.root.join(key);
        match fs::read(path).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// `org-{org}/job-{job}/candidate-{cand}/{name}{ext}`. `ext` carries its
/// leading dot when present.
pub fn object_key(org: Uuid, job: Uuid, candidate: Uuid, name: &str, ext: &str) -> String {
    format!("org-{org}/job-{job}/candidate-{candidate}/{name}{ext}")
}

pub fn metadata_key(org: Uuid, job: Uuid, candidate: Uuid) -> String {
    object_key(org, job, candidate, "metadata.json", "")
}

/// Read-modify-write of the candidate's metadata.json: merge `updates` over
/// whatever is stored and stamp `last_updated`. Last writer wins; the
/// object store offers no cross-object transaction.
pub async fn merge_metadata(
    storage: &dyn ObjectStorage,
    org: Uuid,
    job: Uuid,
    candidate: Uuid,
    updates: Map<String, Value>,
) -> Result<(), StorageError> {
    let key = metadata_key(org, job, candidate);

    let mut current = match storage.get(&key).await? {
        Some(data) => serde_json::from_slice::<Map<String, Value>>(&data)?,
        None => Map::new(),
    };

    for (field, value) in updates {
        current.insert(field, value);
    }
    current.insert(
        "last_updated".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );

    let rendered = serde_json::to_vec_pretty(&Value::Object(current))?;
    storage.put(&key, rendered).await
}
