//! Trigger payload for a single "file added" notification.

use crate::{Error, LEDGER_COLLECTION, Result};
use serde::{Deserialize, Serialize};

/// One object-store notification: a file named `name` landed in `bucket`.
///
/// Storage notifications carry many more fields (size, generation, content
/// type, ...); only the container and the object name matter here and the
/// rest is ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    /// Container (bucket) the object was written to.
    pub bucket: String,

    /// Object name. This is the file identity used as the ledger key and
    /// the sink's per-row dedup key.
    pub name: String,
}

impl FileEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// Parse and validate a trigger payload from raw JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let event: Self = serde_json::from_slice(bytes)?;
        event.validate()?;
        Ok(event)
    }

    /// Reject events with an empty bucket or file identity.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(Error::InvalidField {
                field: "bucket",
                reason: "must not be empty".to_string(),
            });
        }
        if self.name.is_empty() {
            return Err(Error::InvalidField {
                field: "name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// The stable file identity.
    pub fn file_id(&self) -> &str {
        &self.name
    }

    /// Ledger document key for this file.
    pub fn ledger_key(&self) -> String {
        ledger_key(&self.name)
    }
}

/// Ledger document key for a file identity: `streaming_files/<file_id>`.
pub fn ledger_key(file_id: &str) -> String {
    format!("{LEDGER_COLLECTION}/{file_id}")
}
