//! Single-event file ingestion handler.
//!
//! One invocation handles one "file added" event: it checks the ledger for a
//! prior outcome, and either records a duplicate delivery or ingests the file
//! into the sink, records the outcome, and publishes a notification.
//!
//! # Modules
//!
//! - [`pipeline`] - Dedup check, duplicate recorder, ingestor, outcome recorder
//! - [`ledger`] - Per-file status documents (RocksDB)
//! - [`store`] - Object store reads (S3-compatible)
//! - [`sink`] - Analytical sink writes (ClickHouse) with deadline-bounded retry
//! - [`notify`] - Success and error channels (Pub/Sub)
//! - [`server`] - HTTP trigger endpoint
//!
//! # Architecture
//!
//! ```text
//!            ┌─────────────────┐
//!            │  Trigger event  │  {bucket, name}
//!            └────────┬────────┘
//!                     │
//!                     ▼
//!            ┌─────────────────┐
//!            │   Dedup Check   │  ledger: streaming_files/<file_id>
//!            └───┬─────────┬───┘
//!        present │         │ new
//!                ▼         ▼
//! ┌──────────────────┐  ┌─────────────────┐
//! │Duplicate Recorder│  │    Ingestor     │  fetch, parse, insert (retried)
//! └──────────────────┘  └────────┬────────┘
//!                                │ Ok / IngestError
//!                                ▼
//!                       ┌─────────────────┐
//!                       │ Outcome Recorder│  ledger write, then publish
//!                       └─────────────────┘
//! ```
//!
//! The dedup check and the outcome write are not atomic. Two racing first
//! deliveries may both ingest; the sink's idempotency key (the file id)
//! keeps that to one row.

pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod pipeline;
pub mod server;
pub mod sink;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};

pub use ledger::{Ledger, MemoryLedger, RocksLedger};
pub use notify::{Channel, MemoryPublisher, PubSubConfig, PubSubPublisher, Publisher, Topics};
pub use pipeline::{Handled, IngestError, StreamingHandler};
pub use sink::{ClickHouseConfig, ClickHouseSink, MemorySink, Sink, SinkRow, TableRef};
pub use store::{MemoryObjectStore, ObjectStore, S3ObjectStore};
