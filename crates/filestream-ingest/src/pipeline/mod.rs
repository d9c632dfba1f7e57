//! Per-event pipeline.
//!
//! ```text
//!                     ┌──────────────┐
//!   FileEvent ──────▶ │ Dedup Check  │  one ledger read
//!                     └──────┬───────┘
//!               seen ┌───────┴────────┐ new
//!                    ▼                ▼
//!         ┌────────────────────┐  ┌──────────┐
//!         │ Duplicate Recorder │  │ Ingestor │  fetch → parse → insert
//!         └────────────────────┘  └────┬─────┘
//!          append attempt, warn        │ Ok / IngestError
//!                                      ▼
//!                           ┌─────────────────────┐
//!                           │  Outcome Recorder   │  ledger set + publish
//!                           └─────────────────────┘
//! ```
//!
//! Ingestor failures are captured into a failure record; ledger and publish
//! failures abort the invocation and propagate to the trigger.

mod dedup;
mod duplicate;
mod handler;
mod ingest;
mod outcome;

pub use dedup::{Seen, check};
pub use duplicate::record_duplicate;
pub use handler::{Handled, StreamingHandler};
pub use ingest::{IngestError, Ingestor, parse_record};
pub use outcome::OutcomeRecorder;
