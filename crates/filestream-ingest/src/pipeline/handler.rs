//! The per-event handler composing the pipeline stages.

use super::{Ingestor, OutcomeRecorder, Seen, check, record_duplicate};
use crate::Result;
use crate::ledger::Ledger;
use crate::notify::Publisher;
use crate::sink::{Sink, TableRef};
use crate::store::ObjectStore;
use chrono::Utc;
use filestream_core::{FileEvent, Outcome};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// What one invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Handled {
    /// First delivery; row inserted and success recorded.
    Ingested,
    /// First delivery; ingestion failed and the failure was recorded.
    Failed { error_detail: String },
    /// Repeat delivery; attempt appended to the existing record.
    Duplicate { attempts: usize },
}

/// Handles one "file added" event end to end.
///
/// Stateless between calls apart from what the collaborators persist, so a
/// single instance can serve concurrent events.
#[derive(Clone)]
pub struct StreamingHandler {
    ledger: Arc<dyn Ledger>,
    ingestor: Ingestor,
    recorder: OutcomeRecorder,
}

impl StreamingHandler {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn Sink>,
        publisher: Arc<dyn Publisher>,
        table: TableRef,
        insert_deadline: Duration,
    ) -> Self {
        let ingestor = Ingestor::new(store, sink, table.clone(), insert_deadline);
        let recorder = OutcomeRecorder::new(ledger.clone(), publisher, table);
        Self {
            ledger,
            ingestor,
            recorder,
        }
    }

    /// Run one invocation.
    ///
    /// `Err` means the invocation must be retried by the trigger: the ledger
    /// or the notification bus failed. Ingestion failures are not errors
    /// here; they come back as [`Handled::Failed`] once recorded.
    pub async fn handle(&self, event: &FileEvent) -> Result<Handled> {
        event.validate()?;
        let key = event.ledger_key();

        if check(self.ledger.as_ref(), &key).await?.is_present() {
            let attempts =
                record_duplicate(self.ledger.as_ref(), &key, event.file_id(), Utc::now()).await?;
            return Ok(Handled::Duplicate { attempts });
        }

        let result = self.ingestor.ingest(event).await;
        let outcome = self.recorder.record(event, &result, Utc::now()).await?;

        Ok(match outcome {
            Outcome::Success { .. } => Handled::Ingested,
            Outcome::Failure { error_detail, .. } => Handled::Failed { error_detail },
        })
    }
}
