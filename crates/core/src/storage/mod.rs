//! Object storage for snapshot blobs.
//!
//! Buckets are assumed to exist; object names are not collision-checked
//! and overwrites are silent. Objects are write-once from the job's
//! point of view.

use std::{fs, path::PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("bucket or object not found")]
    NotFound,

    #[error("access to bucket denied")]
    PermissionDenied,

    #[error("storage API error: {0}")]
    Api(String),

    #[error("unexpected storage failure: {0}")]
    Unexpected(String),
}

/// Content for a single object write. Structured values are serialized
/// to JSON text before upload; text goes out verbatim.
#[derive(Debug, Clone)]
pub enum ObjectBody {
    Text(String),
    Json(serde_json::Value),
}

impl ObjectBody {
    pub fn into_text(self) -> Result<String, StorageError> {
        match self {
            ObjectBody::Text(text) => Ok(text),
            ObjectBody::Json(value) => {
                serde_json::to_string(&value).map_err(|e| StorageError::Unexpected(e.to_string()))
            }
        }
    }
}

/// Write access to an object-storage bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        object_name: &str,
        body: ObjectBody,
    ) -> Result<(), StorageError>;
}

/// Filesystem store for local development and tests: objects land under
/// `<root>/<bucket>/<object_name>`.
#[derive(Debug)]
pub struct DirObjectStore {
    root: PathBuf,
}

impl DirObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for DirObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        object_name: &str,
        body: ObjectBody,
    ) -> Result<(), StorageError> {
        let dir = self.root.join(bucket);
        fs::create_dir_all(&dir).map_err(|e| {
            log::error!("Failed to create bucket directory {}: {e}", dir.display());
            StorageError::Unexpected(e.to_string())
        })?;

        let text = body.into_text()?;
        let path = dir.join(object_name);
        fs::write(&path, text).map_err(|e| {
            log::error!("Failed to write object {}: {e}", path.display());
            StorageError::Unexpected(e.to_string())
        })?;

        log::info!("Wrote {object_name} to {}", dir.display());
        Ok(())
    }
}
