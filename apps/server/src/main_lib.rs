use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use ratesnap_core::{
    rates::{ExchangeRateApiProvider, RateProvider},
    secrets::{FileSecretStore, SecretStore},
    snapshot::{SnapshotJobConfig, SnapshotService},
    storage::{DirObjectStore, ObjectStore},
};
use ratesnap_gcp::{GcsObjectStore, SecretManagerClient, TokenSource};

pub struct AppState {
    pub snapshots: Arc<SnapshotService>,
}

pub fn init_tracing() {
    let fmt_layer = fmt::layer().json().with_current_span(false);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let rates: Arc<dyn RateProvider> =
        Arc::new(ExchangeRateApiProvider::new(config.rate_api_url.clone()));

    let (secrets, store): (Arc<dyn SecretStore>, Arc<dyn ObjectStore>) = match &config.project_id {
        Some(project_id) => {
            tracing::info!("Using Google Cloud backends for project {project_id}");
            let tokens = Arc::new(TokenSource::new());
            (
                Arc::new(SecretManagerClient::new(project_id.clone(), tokens.clone())),
                Arc::new(GcsObjectStore::new(tokens)),
            )
        }
        None => {
            tracing::info!(
                "GOOGLE_CLOUD_PROJECT not set, using local backends ({} / {})",
                config.secret_file,
                config.storage_dir
            );
            (
                Arc::new(FileSecretStore::new(&config.secret_file)),
                Arc::new(DirObjectStore::new(&config.storage_dir)),
            )
        }
    };

    let job_config = SnapshotJobConfig {
        secret_id: config.secret_id.clone(),
        base_currency: config.base_currency.clone(),
        bucket: config.bucket.clone(),
        persist_upstream_errors: config.persist_upstream_errors,
    };

    let snapshots = Arc::new(SnapshotService::new(secrets, rates, store, job_config));
    Ok(Arc::new(AppState { snapshots }))
}
