//! Cloud Storage uploader.
//!
//! Media upload through the JSON API. The bucket must already exist;
//! uploads with a reused object name overwrite silently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, StatusCode};

use ratesnap_core::storage::{ObjectBody, ObjectStore, StorageError};

use crate::token::TokenSource;

/// Default base URL for the Cloud Storage API.
pub const DEFAULT_STORAGE_URL: &str = "https://storage.googleapis.com";

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GcsObjectStore {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenSource>,
}

impl GcsObjectStore {
    pub fn new(tokens: Arc<TokenSource>) -> Self {
        Self::with_base_url(DEFAULT_STORAGE_URL, tokens)
    }

    pub fn with_base_url(base_url: impl Into<String>, tokens: Arc<TokenSource>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn upload_url(&self, bucket: &str, object_name: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.base_url,
            bucket,
            urlencoding::encode(object_name)
        )
    }

    fn map_status(status: StatusCode) -> StorageError {
        match status {
            StatusCode::NOT_FOUND => StorageError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::PermissionDenied,
            other => StorageError::Api(format!("storage API returned HTTP {}", other.as_u16())),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        object_name: &str,
        body: ObjectBody,
    ) -> Result<(), StorageError> {
        let token = self.tokens.token().await.map_err(|e| {
            log::error!("Failed to upload {object_name} to {bucket}: {e}");
            StorageError::Unexpected(e.to_string())
        })?;

        let text = body.into_text()?;
        let response = self
            .client
            .post(self.upload_url(bucket, object_name))
            .bearer_auth(&token)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(text)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                log::error!("Failed to upload {object_name} to {bucket}: {e}");
                StorageError::Api(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = Self::map_status(status);
            log::error!("Failed to upload {object_name} to {bucket}: {err}");
            return Err(err);
        }

        log::info!("Uploaded {object_name} to {bucket}");
        Ok(())
    }
}
