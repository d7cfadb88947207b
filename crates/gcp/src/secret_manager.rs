//! Secret Manager accessor.
//!
//! Reads the latest version of a named secret under a named project.
//! Read-only; failure categories map onto `SecretError` so callers can
//! tell "not found" from "denied" from "the API fell over".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;

use ratesnap_core::secrets::{SecretError, SecretStore};

use crate::token::TokenSource;

/// Default base URL for the Secret Manager API.
pub const DEFAULT_SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

pub struct SecretManagerClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    tokens: Arc<TokenSource>,
}

impl SecretManagerClient {
    pub fn new(project_id: impl Into<String>, tokens: Arc<TokenSource>) -> Self {
        Self::with_base_url(DEFAULT_SECRET_MANAGER_URL, project_id, tokens)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        tokens: Arc<TokenSource>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            tokens,
        }
    }

    fn access_url(&self, secret_id: &str) -> String {
        format!(
            "{}/v1/projects/{}/secrets/{}/versions/latest:access",
            self.base_url, self.project_id, secret_id
        )
    }

    // Payload is base64 on the wire; the decoded value is trimmed per
    // the SecretStore contract.
    fn decode_payload(data: &str) -> Result<String, SecretError> {
        let bytes = BASE64
            .decode(data)
            .map_err(|e| SecretError::Api(format!("invalid secret payload encoding: {e}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| SecretError::Api("secret payload is not UTF-8".into()))?;
        Ok(text.trim().to_string())
    }

    fn map_status(status: StatusCode) -> SecretError {
        match status {
            StatusCode::NOT_FOUND => SecretError::NotFound,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SecretError::PermissionDenied,
            other => SecretError::Api(format!(
                "secret manager returned HTTP {}",
                other.as_u16()
            )),
        }
    }
}

#[async_trait]
impl SecretStore for SecretManagerClient {
    async fn get_secret(&self, secret_id: &str) -> Result<String, SecretError> {
        let token = self.tokens.token().await.map_err(|e| {
            log::error!("Unexpected error accessing secret {secret_id}: {e}");
            SecretError::Unexpected(e.to_string())
        })?;

        let response = self
            .client
            .get(self.access_url(secret_id))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                log::error!("API error when accessing secret {secret_id}: {e}");
                SecretError::Api(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = Self::map_status(status);
            log::error!("Failed to access secret {secret_id}: {err}");
            return Err(err);
        }

        let body: AccessSecretVersionResponse = response.json().await.map_err(|e| {
            SecretError::Api(format!(
                "malformed secret manager response: {}",
                e.without_url()
            ))
        })?;
        Self::decode_payload(&body.payload.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SecretManagerClient {
        SecretManagerClient::new("my-project", Arc::new(TokenSource::new()))
    }

    #[test]
    fn access_url_targets_latest_version() {
        assert_eq!(
            client().access_url("api-key-exchangerate"),
            "https://secretmanager.googleapis.com/v1/projects/my-project/secrets/api-key-exchangerate/versions/latest:access"
        );
    }

    #[test]
    fn decodes_and_trims_payload() {
        // "  hunter2\n"
        let decoded = SecretManagerClient::decode_payload("ICBodW50ZXIyCg==").unwrap();
        assert_eq!(decoded, "hunter2");
    }

    #[test]
    fn invalid_base64_is_api_error() {
        let err = SecretManagerClient::decode_payload("%%%").unwrap_err();
        assert!(matches!(err, SecretError::Api(_)));
    }

    #[test]
    fn status_mapping_covers_the_taxonomy() {
        assert!(matches!(
            SecretManagerClient::map_status(StatusCode::NOT_FOUND),
            SecretError::NotFound
        ));
        assert!(matches!(
            SecretManagerClient::map_status(StatusCode::FORBIDDEN),
            SecretError::PermissionDenied
        ));
        assert!(matches!(
            SecretManagerClient::map_status(StatusCode::INTERNAL_SERVER_ERROR),
            SecretError::Api(_)
        ));
    }

    #[test]
    fn parses_access_response() {
        let body: AccessSecretVersionResponse = serde_json::from_str(
            r#"{"name":"projects/1/secrets/k/versions/1","payload":{"data":"aHVudGVyMg=="}}"#,
        )
        .unwrap();
        assert_eq!(body.payload.data, "aHVudGVyMg==");
    }
}
