//! Access tokens for Google Cloud REST calls.
//!
//! On GCE and Cloud Run the metadata server hands out OAuth2 access
//! tokens for the instance's service account. Tokens are cached until
//! shortly before their reported expiry. `GOOGLE_OAUTH_ACCESS_TOKEN`
//! overrides the metadata server for local development.

use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the token's reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Default HTTP request timeout; the metadata server is link-local.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
#[error("failed to obtain access token: {0}")]
pub struct TokenError(String);

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Shared token source for all Google Cloud clients in the process.
pub struct TokenSource {
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            cached: Mutex::new(None),
        }
    }

    /// A currently-valid bearer token, from the env override, the
    /// cache, or a fresh metadata-server request, in that order.
    pub async fn token(&self) -> Result<String, TokenError> {
        if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            let token = token.trim().to_string();
            if !token.is_empty() {
                return Ok(token);
            }
        }

        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.expires_at {
                return Ok(entry.value.clone());
            }
        }

        log::debug!("Requesting access token from metadata server");
        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| TokenError(e.without_url().to_string()))?;

        if !response.status().is_success() {
            return Err(TokenError(format!(
                "metadata server returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let token: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|e| TokenError(e.without_url().to_string()))?;

        let expires_at =
            Instant::now() + Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }
}

impl Default for TokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metadata_token_response() {
        let token: MetadataTokenResponse = serde_json::from_str(
            r#"{"access_token":"ya29.token","expires_in":3599,"token_type":"Bearer"}"#,
        )
        .unwrap();

        assert_eq!(token.access_token, "ya29.token");
        assert_eq!(token.expires_in, 3599);
    }
}
