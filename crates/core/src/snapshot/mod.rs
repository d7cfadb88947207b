//! The snapshot job: key, fetch, timestamped object name, upload.
//!
//! Each run is a single linear pass with no state carried between
//! invocations. Every failure category stays distinguishable in the
//! returned error instead of being downgraded to a log line.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::rates::{RateError, RateProvider};
use crate::secrets::SecretStore;
use crate::storage::{ObjectBody, ObjectStore};

/// Options recognized by a snapshot run. Defaults come from the
/// server's configuration, not from constants baked in here.
#[derive(Debug, Clone)]
pub struct SnapshotJobConfig {
    pub secret_id: String,
    pub base_currency: String,
    pub bucket: String,
    /// Store an `API Error: <type>` blob when the upstream reports a
    /// logical failure, keeping an audit trail of failed fetches.
    pub persist_upstream_errors: bool,
}

/// Terminal state of a completed run. Secret, transport and storage
/// failures are `Err` values, not outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// A genuine snapshot was stored.
    Uploaded {
        object_name: String,
        base_code: String,
    },
    /// The upstream reported a failure and the error blob was stored.
    UpstreamErrorRecorded {
        object_name: String,
        error_type: String,
    },
    /// The upstream reported a failure and policy says don't persist it.
    UpstreamErrorSkipped { error_type: String },
}

/// Sequences one snapshot run over the three injected seams.
pub struct SnapshotService {
    secrets: Arc<dyn SecretStore>,
    rates: Arc<dyn RateProvider>,
    store: Arc<dyn ObjectStore>,
    config: SnapshotJobConfig,
}

impl SnapshotService {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        rates: Arc<dyn RateProvider>,
        store: Arc<dyn ObjectStore>,
        config: SnapshotJobConfig,
    ) -> Self {
        Self {
            secrets,
            rates,
            store,
            config,
        }
    }

    pub fn config(&self) -> &SnapshotJobConfig {
        &self.config
    }

    /// Run the job once: fetch the API key, fetch the rates, upload.
    ///
    /// A missing or inaccessible key aborts the run before any rate API
    /// call or upload is attempted.
    pub async fn run(&self) -> Result<SnapshotOutcome> {
        let api_key = self.secrets.get_secret(&self.config.secret_id).await?;

        let base = &self.config.base_currency;
        let object_name = object_name(base, Utc::now());
        log::info!("Snapshot run for base {base}, object {object_name}");

        match self.rates.fetch_latest(base, &api_key).await {
            Ok(snapshot) => {
                self.store
                    .put_object(
                        &self.config.bucket,
                        &object_name,
                        ObjectBody::Text(snapshot.raw_json().to_string()),
                    )
                    .await?;
                log::info!("Uploaded {object_name} to {}", self.config.bucket);
                Ok(SnapshotOutcome::Uploaded {
                    object_name,
                    base_code: snapshot.base_code,
                })
            }
            Err(RateError::Upstream { error_type }) if self.config.persist_upstream_errors => {
                log::warn!("Rate API reported '{error_type}', recording error blob");
                self.store
                    .put_object(
                        &self.config.bucket,
                        &object_name,
                        ObjectBody::Text(format!("API Error: {error_type}")),
                    )
                    .await?;
                Ok(SnapshotOutcome::UpstreamErrorRecorded {
                    object_name,
                    error_type,
                })
            }
            Err(RateError::Upstream { error_type }) => {
                log::warn!("Rate API reported '{error_type}', skipping upload");
                Ok(SnapshotOutcome::UpstreamErrorSkipped { error_type })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// `EXCHANGE_RATE_<BASE>_<YYYYMMDD_HHMMSS>.txt`, from the wall clock at
/// the moment of the run. Second resolution: two runs inside the same
/// second collide and the later write overwrites the earlier one.
pub fn object_name(base_currency: &str, at: DateTime<Utc>) -> String {
    format!(
        "EXCHANGE_RATE_{}_{}.txt",
        base_currency,
        at.format("%Y%m%d_%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    // `super::*` pulls in the 1-arg `crate::errors::Result` alias; the mock
    // trait impls below need std's 2-arg `Result` to match the trait sigs.
    use std::result::Result;
    use crate::errors::Error;
    use crate::rates::RateSnapshot;
    use crate::secrets::SecretError;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FixedSecretStore(Option<String>);

    #[async_trait]
    impl SecretStore for FixedSecretStore {
        async fn get_secret(&self, _secret_id: &str) -> Result<String, SecretError> {
            self.0.clone().ok_or(SecretError::NotFound)
        }
    }

    struct BodyProvider {
        body: String,
        calls: AtomicUsize,
    }

    impl BodyProvider {
        fn new(body: &str) -> Self {
            Self {
                body: body.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RateProvider for BodyProvider {
        async fn fetch_latest(
            &self,
            _base_currency: &str,
            _api_key: &str,
        ) -> Result<RateSnapshot, RateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            RateSnapshot::parse(self.body.clone())
        }
    }

    struct RecordingStore {
        puts: Mutex<Vec<(String, String, String)>>,
        deny: bool,
    }

    #[async_trait]
    impl ObjectStore for RecordingStore {
        async fn put_object(
            &self,
            bucket: &str,
            object_name: &str,
            body: ObjectBody,
        ) -> Result<(), StorageError> {
            if self.deny {
                return Err(StorageError::PermissionDenied);
            }
            self.puts.lock().unwrap().push((
                bucket.to_string(),
                object_name.to_string(),
                body.into_text()?,
            ));
            Ok(())
        }
    }

    const SUCCESS_BODY: &str =
        r#"{"result":"success","base_code":"HKD","conversion_rates":{"HKD":1,"USD":0.1276}}"#;

    fn config() -> SnapshotJobConfig {
        SnapshotJobConfig {
            secret_id: "api-key-exchangerate".into(),
            base_currency: "HKD".into(),
            bucket: "exchange-rates".into(),
            persist_upstream_errors: true,
        }
    }

    fn service(
        secret: Option<&str>,
        body: &str,
        deny_upload: bool,
        persist_upstream_errors: bool,
    ) -> (Arc<BodyProvider>, Arc<RecordingStore>, SnapshotService) {
        let provider = Arc::new(BodyProvider::new(body));
        let store = Arc::new(RecordingStore {
            puts: Mutex::new(Vec::new()),
            deny: deny_upload,
        });
        let service = SnapshotService::new(
            Arc::new(FixedSecretStore(secret.map(String::from))),
            provider.clone(),
            store.clone(),
            SnapshotJobConfig {
                persist_upstream_errors,
                ..config()
            },
        );
        (provider, store, service)
    }

    #[tokio::test]
    async fn missing_key_aborts_before_any_call() {
        let (provider, store, service) = service(None, SUCCESS_BODY, false, true);

        let err = service.run().await.unwrap_err();
        assert!(matches!(err, Error::Secret(SecretError::NotFound)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(store.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn uploads_exact_upstream_body() {
        let (_, store, service) = service(Some("key"), SUCCESS_BODY, false, true);

        let outcome = service.run().await.unwrap();
        let puts = store.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        let (bucket, object_name, content) = &puts[0];

        assert_eq!(bucket, "exchange-rates");
        assert!(object_name.starts_with("EXCHANGE_RATE_HKD_"));
        assert!(object_name.ends_with(".txt"));
        assert_eq!(content, SUCCESS_BODY);
        assert!(matches!(
            outcome,
            SnapshotOutcome::Uploaded { base_code, .. } if base_code == "HKD"
        ));
    }

    #[tokio::test]
    async fn upstream_error_recorded_as_blob() {
        let body = r#"{"result":"error","error-type":"invalid-key"}"#;
        let (_, store, service) = service(Some("key"), body, false, true);

        let outcome = service.run().await.unwrap();
        let puts = store.puts.lock().unwrap();
        assert_eq!(puts[0].2, "API Error: invalid-key");
        assert!(matches!(
            outcome,
            SnapshotOutcome::UpstreamErrorRecorded { error_type, .. } if error_type == "invalid-key"
        ));
    }

    #[tokio::test]
    async fn upstream_error_skipped_when_policy_off() {
        let body = r#"{"result":"error","error-type":"invalid-key"}"#;
        let (_, store, service) = service(Some("key"), body, false, false);

        let outcome = service.run().await.unwrap();
        assert!(store.puts.lock().unwrap().is_empty());
        assert_eq!(
            outcome,
            SnapshotOutcome::UpstreamErrorSkipped {
                error_type: "invalid-key".into()
            }
        );
    }

    #[tokio::test]
    async fn upload_denial_propagates() {
        let (_, _, service) = service(Some("key"), SUCCESS_BODY, true, true);

        let err = service.run().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Storage(StorageError::PermissionDenied)
        ));
    }

    #[test]
    fn object_name_has_second_resolution() {
        let at = Utc.with_ymd_and_hms(2025, 5, 27, 0, 0, 1).unwrap();
        assert_eq!(
            object_name("HKD", at),
            "EXCHANGE_RATE_HKD_20250527_000001.txt"
        );
    }
}
