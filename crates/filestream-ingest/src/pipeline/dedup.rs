use crate::Result;
use crate::ledger::Ledger;
use filestream_core::Status;

/// What the ledger knows about a file before this delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seen {
    /// No record: first delivery.
    New,
    /// A success record exists.
    Succeeded,
    /// A failure record exists.
    Failed,
}

impl Seen {
    /// Whether a terminal record already exists.
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::New)
    }
}

/// Classify a delivery with a single ledger read.
///
/// Ledger errors are returned unchanged; the caller must not treat them as
/// "new".
pub async fn check(ledger: &dyn Ledger, key: &str) -> Result<Seen> {
    Ok(match ledger.get(key).await? {
        None => Seen::New,
        Some(record) => match record.status() {
            Status::Success => Seen::Succeeded,
            Status::Failure => Seen::Failed,
        },
    })
}
