//! Exchange-rate fetching.
//!
//! One GET against the exchangerate-api.com v6 endpoint per run, no
//! retries. The parsed snapshot keeps the verbatim response body so the
//! stored blob is byte-identical to what the upstream returned.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error code reported when the upstream names none.
const UNKNOWN_ERROR_TYPE: &str = "Unknown error";

/// Default base URL for the exchangerate-api.com v6 API.
pub const DEFAULT_RATE_API_URL: &str = "https://v6.exchangerate-api.com";

#[derive(Error, Debug)]
pub enum RateError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate API returned HTTP {0}")]
    Status(u16),

    #[error("failed to parse rate API response: {0}")]
    Parse(String),

    #[error("rate API reported failure: {error_type}")]
    Upstream { error_type: String },
}

/// Wire envelope of the v6 `latest` endpoint.
#[derive(Debug, Deserialize)]
struct RateEnvelope {
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    base_code: Option<String>,
    #[serde(default)]
    conversion_rates: HashMap<String, f64>,
    time_last_update_unix: Option<i64>,
    time_next_update_unix: Option<i64>,
}

/// One fetched set of conversion rates at a point in time.
///
/// The snapshot is treated as an opaque payload beyond the envelope
/// fields: internal consistency (e.g. the base currency's own rate
/// being 1.0) is upstream's business, not validated here.
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub base_code: String,
    pub conversion_rates: HashMap<String, f64>,
    pub time_last_update_unix: Option<i64>,
    pub time_next_update_unix: Option<i64>,
    raw: String,
}

impl RateSnapshot {
    /// The verbatim upstream response body.
    pub fn raw_json(&self) -> &str {
        &self.raw
    }

    /// Parse an upstream response body, keeping it verbatim on success.
    pub fn parse(body: String) -> Result<Self, RateError> {
        let envelope: RateEnvelope =
            serde_json::from_str(&body).map_err(|e| RateError::Parse(e.to_string()))?;

        if envelope.result != "success" {
            let error_type = envelope
                .error_type
                .unwrap_or_else(|| UNKNOWN_ERROR_TYPE.to_string());
            return Err(RateError::Upstream { error_type });
        }

        Ok(Self {
            base_code: envelope.base_code.unwrap_or_default(),
            conversion_rates: envelope.conversion_rates,
            time_last_update_unix: envelope.time_last_update_unix,
            time_next_update_unix: envelope.time_next_update_unix,
            raw: body,
        })
    }
}

/// A source of rate snapshots for a base currency.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_latest(
        &self,
        base_currency: &str,
        api_key: &str,
    ) -> Result<RateSnapshot, RateError>;
}

/// exchangerate-api.com v6 client.
pub struct ExchangeRateApiProvider {
    client: Client,
    base_url: String,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    // The key is a URL path segment on this API, so the full URL must
    // never reach a log line.
    fn request_url(&self, base_currency: &str, api_key: &str) -> String {
        format!("{}/v6/{}/latest/{}", self.base_url, api_key, base_currency)
    }
}

impl Default for ExchangeRateApiProvider {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_API_URL)
    }
}

#[async_trait]
impl RateProvider for ExchangeRateApiProvider {
    async fn fetch_latest(
        &self,
        base_currency: &str,
        api_key: &str,
    ) -> Result<RateSnapshot, RateError> {
        let url = self.request_url(base_currency, api_key);

        let response = self.client.get(&url).send().await.map_err(|e| {
            let e = e.without_url();
            log::error!("Rate request for base {base_currency} failed: {e}");
            RateError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            log::error!(
                "Rate API returned HTTP {} for base {base_currency}",
                status.as_u16()
            );
            return Err(RateError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RateError::Network(e.without_url().to_string()))?;
        RateSnapshot::parse(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_envelope() {
        let body = r#"{"result":"success","base_code":"HKD","conversion_rates":{"HKD":1,"USD":0.1276}}"#;
        let snapshot = RateSnapshot::parse(body.to_string()).unwrap();

        assert_eq!(snapshot.base_code, "HKD");
        assert_eq!(snapshot.conversion_rates["USD"], 0.1276);
        assert_eq!(snapshot.conversion_rates["HKD"], 1.0);
        assert_eq!(snapshot.raw_json(), body);
    }

    #[test]
    fn error_envelope_carries_error_type() {
        let body = r#"{"result":"error","error-type":"invalid-key"}"#;
        let err = RateSnapshot::parse(body.to_string()).unwrap_err();

        match err {
            RateError::Upstream { error_type } => assert_eq!(error_type, "invalid-key"),
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn missing_error_type_defaults_to_unknown() {
        let err = RateSnapshot::parse(r#"{"result":"error"}"#.to_string()).unwrap_err();

        match err {
            RateError::Upstream { error_type } => assert_eq!(error_type, "Unknown error"),
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_parse_error() {
        let err = RateSnapshot::parse("<html>upstream exploded</html>".to_string()).unwrap_err();
        assert!(matches!(err, RateError::Parse(_)));
    }

    #[test]
    fn request_url_embeds_key_and_base() {
        let provider = ExchangeRateApiProvider::new("https://rates.example.test/");
        assert_eq!(
            provider.request_url("HKD", "k3y"),
            "https://rates.example.test/v6/k3y/latest/HKD"
        );
    }
}
