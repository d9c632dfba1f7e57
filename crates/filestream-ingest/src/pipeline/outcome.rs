//! Outcome Recorder & Notifier.
//!
//! Writes the terminal record, then publishes exactly one message on the
//! channel matching the outcome. Neither step is caught here: if either
//! fails the sink row (if any) stays in place and the invocation aborts.
//! Reconciling that case is manual, using the `show` subcommand and the
//! sink table.

use super::IngestError;
use crate::Result;
use crate::ledger::Ledger;
use crate::notify::{Channel, Publisher};
use crate::sink::TableRef;
use chrono::{DateTime, Utc};
use filestream_core::metrics::record_outcome;
use filestream_core::{FileEvent, IngestionRecord, Outcome};
use std::sync::Arc;

#[derive(Clone)]
pub struct OutcomeRecorder {
    ledger: Arc<dyn Ledger>,
    publisher: Arc<dyn Publisher>,
    table: TableRef,
}

impl OutcomeRecorder {
    pub fn new(ledger: Arc<dyn Ledger>, publisher: Arc<dyn Publisher>, table: TableRef) -> Self {
        Self {
            ledger,
            publisher,
            table,
        }
    }

    /// Record and announce the result of ingesting `event`.
    pub async fn record(
        &self,
        event: &FileEvent,
        result: &std::result::Result<(), IngestError>,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let file_id = event.file_id();

        let (record, channel, message) = match result {
            Ok(()) => (
                IngestionRecord::success(file_id, now),
                Channel::Success,
                format!("File '{}' streamed into {}", file_id, self.table),
            ),
            Err(e) => {
                let detail = e.to_string();
                let message = format!("Error streaming file '{}'. Cause: {}", file_id, detail);
                (
                    IngestionRecord::failure(file_id, now, detail),
                    Channel::Error,
                    message,
                )
            }
        };

        self.ledger.set(&event.ledger_key(), &record).await?;
        self.publisher
            .publish(channel, message.clone().into_bytes(), file_id)
            .await?;

        record_outcome(record.status());
        match channel {
            Channel::Success => tracing::info!(file_id = %file_id, "{}", message),
            Channel::Error => tracing::error!(file_id = %file_id, "{}", message),
        }

        Ok(record.outcome)
    }
}
