//! Ratesnap Core - Domain types, traits, and the snapshot job.
//!
//! This crate is cloud-agnostic. It defines the `SecretStore`,
//! `RateProvider` and `ObjectStore` seams together with file-backed
//! local implementations; the `ratesnap-gcp` crate implements the same
//! traits against Google Cloud services.

pub mod errors;
pub mod rates;
pub mod secrets;
pub mod snapshot;
pub mod storage;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
