//! The Ingestor: fetch one file, parse it as one JSON object, insert one row.
//!
//! All-or-nothing per file. Every way this can fail is an [`IngestError`];
//! the handler turns it into a failure record and an error-channel message.

use crate::sink::{RowError, Sink, SinkError, SinkRow, TableRef};
use crate::store::{ObjectStore, StoreError};
use chrono::Utc;
use filestream_core::FileEvent;
use filestream_core::metrics::INGEST_SECONDS;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a file could not be ingested.
///
/// The `Display` output is the diagnostic stored in the ledger and sent on
/// the error channel, so every variant names the underlying cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("content fetch failed: {0}")]
    Fetch(#[from] StoreError),

    #[error("content of '{file_id}' is not a valid JSON object: {reason}")]
    Parse { file_id: String, reason: String },

    #[error("sink insert failed: {0}")]
    Insert(#[from] SinkError),

    #[error("sink rejected {} row(s): {}", .0.len(), join_row_errors(.0))]
    RowsRejected(Vec<RowError>),
}

fn join_row_errors(errors: &[RowError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse file content as a single JSON object.
///
/// Arrays, scalars, and trailing garbage are rejected: one file is one row.
pub fn parse_record(file_id: &str, content: &[u8]) -> Result<Map<String, Value>, IngestError> {
    let parse_error = |reason: String| IngestError::Parse {
        file_id: file_id.to_string(),
        reason,
    };

    match serde_json::from_slice::<Value>(content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(parse_error(format!(
            "expected an object, found {}",
            json_kind(&other)
        ))),
        Err(e) => Err(parse_error(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Fetches, parses, and inserts one file.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn Sink>,
    table: TableRef,
    deadline: Duration,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn Sink>,
        table: TableRef,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            table,
            deadline,
        }
    }

    /// Ingest the file named by `event`.
    pub async fn ingest(&self, event: &FileEvent) -> Result<(), IngestError> {
        let started = Instant::now();
        let result = self.ingest_inner(event).await;
        metrics::histogram!(INGEST_SECONDS).record(started.elapsed().as_secs_f64());
        result
    }

    async fn ingest_inner(&self, event: &FileEvent) -> Result<(), IngestError> {
        let content = self.store.fetch(&event.bucket, &event.name).await?;
        let record = parse_record(event.file_id(), &content)?;

        let row = SinkRow {
            row_id: event.file_id().to_string(),
            file_id: event.file_id().to_string(),
            bucket: event.bucket.clone(),
            payload: Value::Object(record).to_string(),
            ingested_at: Utc::now().timestamp().clamp(0, i64::from(u32::MAX)) as u32,
        };

        let rejected = self
            .sink
            .insert_rows(&self.table, std::slice::from_ref(&row), self.deadline)
            .await?;
        if !rejected.is_empty() {
            return Err(IngestError::RowsRejected(rejected));
        }

        tracing::debug!(
            file_id = %event.file_id(),
            bytes = content.len(),
            table = %self.table,
            "Inserted file into sink"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::store::MemoryObjectStore;

    fn ingestor(store: Arc<MemoryObjectStore>, sink: Arc<MemorySink>) -> Ingestor {
        Ingestor::new(store, sink, TableRef::default(), Duration::from_millis(200))
    }

    #[test]
    fn test_parse_object() {
        let map = parse_record("a.json", br#"{"order": 7, "total": 12.5}"#).unwrap();
        assert_eq!(map["order"], 7);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let err = parse_record("a.json", b"{\"order\": ").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("a.json"));
        assert!(msg.contains("EOF"));
    }

    #[test]
    fn test_parse_rejects_array() {
        let err = parse_record("a.json", b"[1, 2]").unwrap_err();
        assert!(err.to_string().contains("found an array"));
    }

    #[test]
    fn test_rows_rejected_display_lists_reasons() {
        let err = IngestError::RowsRejected(vec![RowError {
            row_id: "a.json".to_string(),
            reason: "no such field: amount".to_string(),
        }]);
        assert_eq!(
            err.to_string(),
            "sink rejected 1 row(s): row 'a.json': no such field: amount"
        );
    }

    #[tokio::test]
    async fn test_ingest_inserts_one_row_keyed_by_file() {
        let store = Arc::new(MemoryObjectStore::new());
        let sink = Arc::new(MemorySink::new());
        store.put("landing", "orders/2021-01-01.json", br#"{"id": 1}"#.to_vec());

        ingestor(store, sink.clone())
            .ingest(&FileEvent::new("landing", "orders/2021-01-01.json"))
            .await
            .unwrap();

        let rows = sink.rows(&TableRef::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row_id, "orders/2021-01-01.json");
        assert_eq!(rows[0].bucket, "landing");
        assert_eq!(rows[0].payload, r#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_missing_object_is_fetch_failure() {
        let store = Arc::new(MemoryObjectStore::new());
        let sink = Arc::new(MemorySink::new());

        let err = ingestor(store, sink.clone())
            .ingest(&FileEvent::new("landing", "missing.json"))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Fetch(StoreError::NotFound { .. })));
        assert_eq!(sink.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_parse_failure_never_reaches_sink() {
        let store = Arc::new(MemoryObjectStore::new());
        let sink = Arc::new(MemorySink::new());
        store.put("landing", "bad.json", b"not json".to_vec());

        let err = ingestor(store, sink.clone())
            .ingest(&FileEvent::new("landing", "bad.json"))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Parse { .. }));
        assert_eq!(sink.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_row_errors_are_failure() {
        let store = Arc::new(MemoryObjectStore::new());
        let sink = Arc::new(MemorySink::new());
        store.put("landing", "a.json", b"{}".to_vec());
        sink.reject_rows("schema mismatch");

        let err = ingestor(store, sink.clone())
            .ingest(&FileEvent::new("landing", "a.json"))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::RowsRejected(ref rows) if rows.len() == 1));
        assert!(sink.rows(&TableRef::default()).is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retry_budget_is_failure() {
        let store = Arc::new(MemoryObjectStore::new());
        let sink = Arc::new(MemorySink::new());
        store.put("landing", "a.json", b"{}".to_vec());
        sink.fail_transiently(u32::MAX);

        let err = ingestor(store, sink)
            .ingest(&FileEvent::new("landing", "a.json"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Insert(SinkError::DeadlineExceeded { .. })
        ));
    }
}
