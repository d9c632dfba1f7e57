//! Core types, validation, and shared utilities for the filestream ingestion handler.
//!
//! This crate provides:
//! - The trigger payload ([`FileEvent`]) and its validation
//! - The ledger's per-file status document ([`IngestionRecord`])
//! - Prometheus metrics helpers
//! - Shared error types

mod error;
mod event;
pub mod metrics;
mod record;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Ledger collection holding one status document per ingested file.
pub const LEDGER_COLLECTION: &str = "streaming_files";

/// Default deadline for the sink insertion retry budget, in seconds.
pub const DEFAULT_INSERT_DEADLINE_SECS: u64 = 30;

pub use error::{Error, Result};
pub use event::{FileEvent, ledger_key};
pub use record::{IngestionRecord, Outcome, Status};
