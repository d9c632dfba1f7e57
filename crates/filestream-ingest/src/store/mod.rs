//! Object store: the content source for newly landed files.
//!
//! - [`S3ObjectStore`] - any S3-compatible store (AWS, MinIO, GCS interop)
//! - [`MemoryObjectStore`] - in-process, for tests

mod memory;
mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use thiserror::Error;

/// Why an object could not be fetched.
///
/// Both variants are ingestion failures: they are recorded in the ledger and
/// published on the error channel, never retried by the handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("object {bucket}/{name} not found")]
    NotFound { bucket: String, name: String },

    #[error("failed to fetch {bucket}/{name}: {reason}")]
    Fetch {
        bucket: String,
        name: String,
        reason: String,
    },
}

/// Fetch-by-path access to stored objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download the full content of `name` in `bucket`.
    async fn fetch(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError>;
}
