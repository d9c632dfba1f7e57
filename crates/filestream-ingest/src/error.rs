//! Error types for the ingestion handler.
//!
//! Everything in [`Error`] is fatal to an invocation: it propagates to the
//! trigger, which is expected to re-deliver the event. Failures of the
//! Ingestor itself are classified separately as
//! [`IngestError`](crate::pipeline::IngestError) and recorded in the ledger.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an invocation.
#[derive(Error, Debug)]
pub enum Error {
    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Ledger unavailable or rejected the operation.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// A ledger document that must exist was missing.
    #[error("Ledger document not found: {0}")]
    NotFound(String),

    /// Notification publish failed.
    #[error("Publish error: {0}")]
    Publish(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid trigger payload.
    #[error(transparent)]
    Core(#[from] filestream_core::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
