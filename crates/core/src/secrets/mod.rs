//! Secret access for the snapshot job.
//!
//! The job's API key lives in a managed secret store. `SecretStore` is
//! the seam: `ratesnap-gcp` implements it against Secret Manager, and
//! `FileSecretStore` keeps secrets in a local JSON file for development
//! and tests.

use std::{collections::HashMap, fs, path::PathBuf, sync::Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CURRENT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("secret not found")]
    NotFound,

    #[error("access to secret denied")]
    PermissionDenied,

    #[error("secret store API error: {0}")]
    Api(String),

    #[error("unexpected secret store failure: {0}")]
    Unexpected(String),
}

/// Read access to named secrets. Returned values are UTF-8 text with
/// surrounding whitespace trimmed. Secret values must never be logged.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, secret_id: &str) -> Result<String, SecretError>;
}

#[derive(Serialize, Deserialize, Default)]
struct PlainSecrets {
    version: u32,
    secrets: HashMap<String, String>,
}

/// JSON-file secret store for local development and tests.
#[derive(Debug)]
pub struct FileSecretStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store a secret, creating the file (and parent directories) on
    /// first write.
    pub fn set_secret(&self, secret_id: &str, value: &str) -> Result<(), SecretError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| SecretError::Unexpected("secret store lock poisoned".into()))?;
        let mut store = self.load_store_locked()?;
        store.insert(secret_id.to_string(), value.to_string());
        self.persist_store_locked(&store)
    }

    fn load_store_locked(&self) -> Result<HashMap<String, String>, SecretError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let raw = fs::read(&self.path)
            .map_err(|e| SecretError::Unexpected(format!("failed to read secrets file: {e}")))?;
        if raw.is_empty() {
            return Ok(HashMap::new());
        }

        let plain: PlainSecrets = serde_json::from_slice(&raw)
            .map_err(|e| SecretError::Unexpected(format!("malformed secrets file: {e}")))?;
        Ok(plain.secrets)
    }

    fn persist_store_locked(&self, store: &HashMap<String, String>) -> Result<(), SecretError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SecretError::Unexpected(format!("failed to create secrets directory: {e}"))
            })?;
        }

        let plain = PlainSecrets {
            version: CURRENT_VERSION,
            secrets: store.clone(),
        };
        let json = serde_json::to_string_pretty(&plain)
            .map_err(|e| SecretError::Unexpected(e.to_string()))?;
        fs::write(&self.path, json)
            .map_err(|e| SecretError::Unexpected(format!("failed to write secrets file: {e}")))
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_secret(&self, secret_id: &str) -> Result<String, SecretError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| SecretError::Unexpected("secret store lock poisoned".into()))?;
        let store = self.load_store_locked().map_err(|e| {
            log::error!("Failed to load secrets file {}: {e}", self.path.display());
            e
        })?;
        match store.get(secret_id) {
            Some(value) => Ok(value.trim().to_string()),
            None => {
                log::error!("Secret {secret_id} not found in {}", self.path.display());
                Err(SecretError::NotFound)
            }
        }
    }
}
