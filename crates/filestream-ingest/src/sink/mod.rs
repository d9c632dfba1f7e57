//! Analytical sink: one row per successfully ingested file.
//!
//! Every row carries a `row_id` equal to the file identity. Sinks must treat
//! it as an idempotency key: inserting the same `row_id` twice (e.g. a
//! re-delivery that raced past the ledger check) must not produce a second
//! row. This is the only guard against duplicate rows, since the ledger
//! check-then-write is not atomic.
//!
//! Inserts run under a deadline. Transient errors are retried with backoff
//! inside the sink until the deadline elapses ([`retry`]); anything the sink
//! rejects outright comes back as row-level errors.
//!
//! - [`ClickHouseSink`] - ClickHouse, using `insert_deduplication_token`
//! - [`MemorySink`] - in-process, for tests

#[path = "clickhouse.rs"]
mod clickhouse_sink;
mod memory;
pub mod retry;

pub use self::clickhouse_sink::{ClickHouseConfig, ClickHouseSink};
pub use memory::MemorySink;

use ::clickhouse::Row;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Target table of the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Database (dataset) name.
    pub database: String,

    /// Table name.
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl Default for TableRef {
    fn default() -> Self {
        Self::new("dataset_files_sink_json", "table_sink")
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// Row structure matching the sink table.
#[derive(Debug, Clone, PartialEq, Eq, Row, Serialize, Deserialize)]
pub struct SinkRow {
    /// Per-row dedup key (the file identity).
    pub row_id: String,
    pub file_id: String,
    pub bucket: String,
    /// The file's JSON object, compact-encoded.
    pub payload: String,
    /// Unix seconds at insertion.
    pub ingested_at: u32,
}

/// A row the sink refused to store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row_id: String,
    pub reason: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row '{}': {}", self.row_id, self.reason)
    }
}

/// Insert call failures (as opposed to per-row rejections).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Network hiccup, timeout, overloaded server. Worth retrying.
    #[error("transient sink error: {0}")]
    Transient(String),

    /// Not worth retrying.
    #[error("sink error: {0}")]
    Permanent(String),

    /// Transient errors persisted until the retry budget ran out.
    #[error(
        "insert did not succeed within {deadline:?} ({attempts} attempt(s)); last error: {last_error}"
    )]
    DeadlineExceeded {
        deadline: Duration,
        attempts: u32,
        last_error: String,
    },
}

impl SinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Append-row access to the analytical store.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Insert `rows` into `table`, retrying transient errors until `deadline`.
    ///
    /// Returns the rows the sink rejected; an empty list means every row was
    /// stored (or was already present under the same `row_id`).
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[SinkRow],
        deadline: Duration,
    ) -> Result<Vec<RowError>, SinkError>;
}
