use std::{net::SocketAddr, time::Duration};

use ratesnap_core::rates::DEFAULT_RATE_API_URL;

/// Runtime configuration, read once at startup. Every knob the job
/// uses lives here; nothing is baked into the orchestrator.
pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    /// Base currency of the fetched snapshots.
    pub base_currency: String,
    /// Destination bucket; must already exist.
    pub bucket: String,
    /// Secret holding the rate API key.
    pub secret_id: String,
    /// GCP project. Presence selects the Secret Manager / Cloud Storage
    /// backends; otherwise the local file backends are used.
    pub project_id: Option<String>,
    pub rate_api_url: String,
    /// Store `API Error: <type>` blobs for upstream logical failures.
    pub persist_upstream_errors: bool,
    /// Period of the in-process scheduler; `None` disables it.
    pub snapshot_interval: Option<Duration>,
    pub secret_file: String,
    pub storage_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("RS_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .expect("Invalid RS_LISTEN_ADDR");
        let cors_allow = std::env::var("RS_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = std::env::var("RS_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".into())
            .parse()
            .unwrap_or(30000);
        let base_currency = std::env::var("RS_BASE_CURRENCY").unwrap_or_else(|_| "HKD".into());
        let bucket = std::env::var("RS_BUCKET").unwrap_or_else(|_| "exchange-rates".into());
        let secret_id =
            std::env::var("RS_SECRET_ID").unwrap_or_else(|_| "api-key-exchangerate".into());
        let project_id = std::env::var("GOOGLE_CLOUD_PROJECT")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let rate_api_url =
            std::env::var("RS_RATE_API_URL").unwrap_or_else(|_| DEFAULT_RATE_API_URL.into());
        let persist_upstream_errors = std::env::var("RS_PERSIST_UPSTREAM_ERRORS")
            .map(|v| !matches!(v.trim(), "false" | "0"))
            .unwrap_or(true);
        let interval_secs: u64 = std::env::var("RS_SNAPSHOT_INTERVAL_SECS")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .unwrap_or(0);
        let snapshot_interval = (interval_secs > 0).then(|| Duration::from_secs(interval_secs));
        let secret_file =
            std::env::var("RS_SECRET_FILE").unwrap_or_else(|_| "./secrets.json".into());
        let storage_dir = std::env::var("RS_STORAGE_DIR").unwrap_or_else(|_| "./snapshots".into());

        Self {
            listen_addr,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            base_currency,
            bucket,
            secret_id,
            project_id,
            rate_api_url,
            persist_upstream_errors,
            snapshot_interval,
            secret_file,
            storage_dir,
        }
    }
}
