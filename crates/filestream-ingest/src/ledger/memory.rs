//! In-process ledger for tests and dry runs.

use super::Ledger;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filestream_core::IngestionRecord;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Ledger held in a `HashMap`.
///
/// Can be switched "unavailable" to exercise the fatal ledger path, and
/// counts full overwrites so tests can assert the duplicate branch never
/// rewrites a terminal record.
#[derive(Default)]
pub struct MemoryLedger {
    docs: Mutex<HashMap<String, IngestionRecord>>,
    unavailable: AtomicBool,
    sets: AtomicUsize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document directly, bypassing the write counter.
    pub fn insert(&self, key: impl Into<String>, record: IngestionRecord) {
        self.docs.lock().insert(key.into(), record);
    }

    /// Make every subsequent call fail with [`Error::Ledger`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of full overwrites performed through [`Ledger::set`].
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.docs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.lock().is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Ledger("ledger unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.docs.lock().contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<IngestionRecord>> {
        self.check_available()?;
        Ok(self.docs.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, record: &IngestionRecord) -> Result<()> {
        self.check_available()?;
        self.docs.lock().insert(key.to_string(), record.clone());
        self.sets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_duplication_attempts(
        &self,
        key: &str,
        attempts: &[DateTime<Utc>],
    ) -> Result<()> {
        self.check_available()?;
        let mut docs = self.docs.lock();
        let record = docs
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        record.duplication_attempts = attempts.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_fails_reads() {
        let ledger = MemoryLedger::new();
        ledger.set_unavailable(true);

        let err = ledger.get("streaming_files/a.json").await.unwrap_err();
        assert!(matches!(err, Error::Ledger(_)));
    }

    #[tokio::test]
    async fn test_set_counts_overwrites() {
        let ledger = MemoryLedger::new();
        let record = IngestionRecord::success("a.json", Utc::now());

        ledger.set("streaming_files/a.json", &record).await.unwrap();
        ledger.set("streaming_files/a.json", &record).await.unwrap();

        assert_eq!(ledger.set_count(), 2);
        assert_eq!(ledger.len(), 1);
    }
}
