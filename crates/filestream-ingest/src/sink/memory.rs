use super::retry::{BackoffConfig, retry_within_deadline};
use super::{RowError, Sink, SinkError, SinkRow, TableRef};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

const FAST_BACKOFF: BackoffConfig = BackoffConfig {
    initial_delay: Duration::from_millis(2),
    max_delay: Duration::from_millis(10),
    backoff_multiplier: 2.0,
};

/// In-memory sink that honours the `row_id` idempotency key.
///
/// Failure injection:
/// - [`MemorySink::fail_transiently`] makes the next N attempts fail with a
///   transient error (retried within the deadline)
/// - [`MemorySink::reject_rows`] makes every insert return a row error
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<BTreeMap<(String, String), SinkRow>>,
    transient_failures: AtomicU32,
    reject_reason: Mutex<Option<String>>,
    insert_calls: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_transiently(&self, attempts: u32) {
        self.transient_failures.store(attempts, Ordering::SeqCst);
    }

    pub fn reject_rows(&self, reason: impl Into<String>) {
        *self.reject_reason.lock() = Some(reason.into());
    }

    /// Rows stored in `table`.
    pub fn rows(&self, table: &TableRef) -> Vec<SinkRow> {
        let key = table.to_string();
        self.rows
            .lock()
            .iter()
            .filter(|((t, _), _)| *t == key)
            .map(|(_, row)| row.clone())
            .collect()
    }

    /// Number of `insert_rows` calls received.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn attempt(&self, table: &TableRef, rows: &[SinkRow]) -> Result<Vec<RowError>, SinkError> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SinkError::Transient("simulated timeout".to_string()));
        }

        if let Some(reason) = self.reject_reason.lock().clone() {
            return Ok(rows
                .iter()
                .map(|row| RowError {
                    row_id: row.row_id.clone(),
                    reason: reason.clone(),
                })
                .collect());
        }

        let mut stored = self.rows.lock();
        for row in rows {
            stored
                .entry((table.to_string(), row.row_id.clone()))
                .or_insert_with(|| row.clone());
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[SinkRow],
        deadline: Duration,
    ) -> Result<Vec<RowError>, SinkError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        retry_within_deadline(deadline, FAST_BACKOFF, move || async move {
            self.attempt(table, rows)
        })
        .await
    }
}
