use thiserror::Error;

use crate::rates::RateError;
use crate::secrets::SecretError;
use crate::storage::StorageError;

// Create a type alias for Result using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the snapshot pipeline
#[derive(Error, Debug)]
pub enum Error {
    #[error("Secret access failed: {0}")]
    Secret(#[from] SecretError),

    #[error("Rate fetch failed: {0}")]
    Rates(#[from] RateError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),
}
