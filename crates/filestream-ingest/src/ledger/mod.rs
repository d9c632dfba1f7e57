//! Status ledger: one document per file identity.
//!
//! The ledger is keyed by `streaming_files/<file_id>` (see
//! [`filestream_core::ledger_key`]) and supports exactly the operations the
//! pipeline needs:
//!
//! - existence check and full read (Dedup Check, Duplicate Recorder)
//! - full overwrite (Outcome Recorder)
//! - partial update of `duplication_attempts` (Duplicate Recorder)
//!
//! There is no compare-and-set. Two concurrent first deliveries of the same
//! file can both see "absent" and both write a terminal record; the last
//! write wins and the sink's per-row dedup key keeps the analytical table
//! free of duplicate rows.
//!
//! # Implementations
//!
//! - [`RocksLedger`] - durable, RocksDB-backed
//! - [`MemoryLedger`] - in-process, for tests and dry runs

mod memory;
mod rocks;

pub use memory::MemoryLedger;
pub use rocks::RocksLedger;

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filestream_core::IngestionRecord;

/// Keyed document access for ingestion status records.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether a document exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Read the full document, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<IngestionRecord>>;

    /// Overwrite the document under `key`.
    async fn set(&self, key: &str, record: &IngestionRecord) -> Result<()>;

    /// Replace only the `duplication_attempts` field of an existing document.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if there is no
    /// document under `key`.
    async fn update_duplication_attempts(
        &self,
        key: &str,
        attempts: &[DateTime<Utc>],
    ) -> Result<()>;
}
