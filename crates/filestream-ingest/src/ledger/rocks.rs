//! RocksDB-backed status ledger.
//!
//! # Key Design
//!
//! - Keys: `streaming_files/<file_id>` as UTF-8 bytes
//! - Values: the JSON-encoded [`IngestionRecord`]
//! - Every write is synced so a returned `set` is durable
//!
//! A terminal record is a single `put`, so an invocation killed mid-flight
//! either left the record in place or left nothing.

use super::Ledger;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filestream_core::IngestionRecord;
use rocksdb::{DBWithThreadMode, MultiThreaded, Options, WriteOptions};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const ATTEMPTS_FIELD: &str = "duplication_attempts";

/// Durable ledger stored in a local RocksDB database.
///
/// Thread-safe: can be shared across request handlers via `Arc<RocksLedger>`.
pub struct RocksLedger {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksLedger {
    /// Open or create a ledger at the given path.
    ///
    /// ```no_run
    /// use filestream_ingest::RocksLedger;
    ///
    /// let ledger = RocksLedger::open("./data/ledger")?;
    /// # Ok::<(), filestream_ingest::Error>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening ledger at {}", path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);

        // Point lookups dominate: one get per delivery
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);

        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.increase_parallelism(num_cpus::get() as i32);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn put_synced(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        self.db.put_opt(key.as_bytes(), value, &write_opts)?;
        Ok(())
    }

    /// Write raw bytes under `key`, bypassing record encoding.
    #[cfg(test)]
    pub(crate) fn put_raw(&self, key: &str, value: &[u8]) -> Result<()> {
        self.put_synced(key, value)
    }

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for RocksLedger {
    async fn exists(&self, key: &str) -> Result<bool> {
        // Bloom filter makes the miss path cheap
        if !self.db.key_may_exist(key.as_bytes()) {
            return Ok(false);
        }
        Ok(self.db.get_pinned(key.as_bytes())?.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<IngestionRecord>> {
        match self.db.get_pinned(key.as_bytes())? {
            Some(value) => IngestionRecord::from_json(&value)
                .map(Some)
                .map_err(|e| undecodable(key, e)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, record: &IngestionRecord) -> Result<()> {
        let value = record.to_json().map_err(|e| undecodable(key, e))?;
        self.put_synced(key, &value)?;
        debug!("Wrote {} record for {}", record.status().as_str(), key);
        Ok(())
    }

    async fn update_duplication_attempts(
        &self,
        key: &str,
        attempts: &[DateTime<Utc>],
    ) -> Result<()> {
        let existing = self
            .db
            .get_pinned(key.as_bytes())?
            .ok_or_else(|| Error::NotFound(key.to_string()))?;

        // Patch the raw document so no other field is rewritten
        let mut doc: Value =
            serde_json::from_slice(&existing).map_err(|e| undecodable(key, e))?;
        let fields = doc
            .as_object_mut()
            .ok_or_else(|| Error::Ledger(format!("document {key} is not a JSON object")))?;
        fields.insert(ATTEMPTS_FIELD.to_string(), serde_json::to_value(attempts)?);

        self.put_synced(key, &serde_json::to_vec(&doc)?)
    }
}

/// A stored document that does not decode is a ledger fault, never a bad
/// trigger payload.
fn undecodable(key: &str, err: impl std::fmt::Display) -> Error {
    Error::Ledger(format!("undecodable document {key}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_get_absent() {
        let tmp = TempDir::new().unwrap();
        let ledger = RocksLedger::open(tmp.path()).unwrap();

        assert!(!ledger.exists("streaming_files/a.json").await.unwrap());
        assert!(ledger.get("streaming_files/a.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let tmp = TempDir::new().unwrap();
        let ledger = RocksLedger::open(tmp.path()).unwrap();
        let record = IngestionRecord::failure("a.json", t(100), "parse error");

        ledger.set("streaming_files/a.json", &record).await.unwrap();

        assert!(ledger.exists("streaming_files/a.json").await.unwrap());
        assert_eq!(
            ledger.get("streaming_files/a.json").await.unwrap(),
            Some(record)
        );
    }

    #[tokio::test]
    async fn test_update_attempts_preserves_outcome() {
        let tmp = TempDir::new().unwrap();
        let ledger = RocksLedger::open(tmp.path()).unwrap();
        let record = IngestionRecord::success("a.json", t(100));
        ledger.set("streaming_files/a.json", &record).await.unwrap();

        ledger
            .update_duplication_attempts("streaming_files/a.json", &[t(200), t(300)])
            .await
            .unwrap();

        let stored = ledger.get("streaming_files/a.json").await.unwrap().unwrap();
        assert_eq!(stored.outcome, record.outcome);
        assert_eq!(stored.duplication_attempts, vec![t(200), t(300)]);
    }

    #[tokio::test]
    async fn test_update_attempts_missing_document() {
        let tmp = TempDir::new().unwrap();
        let ledger = RocksLedger::open(tmp.path()).unwrap();

        let err = ledger
            .update_duplication_attempts("streaming_files/missing.json", &[t(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_ledger_error() {
        let tmp = TempDir::new().unwrap();
        let ledger = RocksLedger::open(tmp.path()).unwrap();
        ledger.put_raw("streaming_files/a.json", b"{not json").unwrap();

        let err = ledger.get("streaming_files/a.json").await.unwrap_err();
        assert!(matches!(err, Error::Ledger(ref msg) if msg.contains("streaming_files/a.json")));

        let err = ledger
            .update_duplication_attempts("streaming_files/a.json", &[t(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Ledger(_)));
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let record = IngestionRecord::success("a.json", t(100));

        {
            let ledger = RocksLedger::open(tmp.path()).unwrap();
            ledger.set("streaming_files/a.json", &record).await.unwrap();
            ledger.flush().unwrap();
        }

        let ledger = RocksLedger::open(tmp.path()).unwrap();
        assert_eq!(
            ledger.get("streaming_files/a.json").await.unwrap(),
            Some(record)
        );
    }
}
