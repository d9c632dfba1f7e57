//! Per-file status document stored in the ledger.
//!
//! A record is created exactly once with a terminal [`Outcome`]; afterwards
//! only `duplication_attempts` grows. The outcome is a tagged variant so a
//! successful record can never carry an error diagnostic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of a file, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Terminal outcome of the first delivery of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Content was inserted into the sink.
    Success {
        /// When the outcome was recorded (UTC).
        when: DateTime<Utc>,
    },

    /// Fetch, parse, or insertion failed.
    Failure {
        /// When the outcome was recorded (UTC).
        when: DateTime<Utc>,
        /// Human-readable diagnostic of the underlying cause.
        error_detail: String,
    },
}

impl Outcome {
    pub fn status(&self) -> Status {
        match self {
            Self::Success { .. } => Status::Success,
            Self::Failure { .. } => Status::Failure,
        }
    }

    pub fn when(&self) -> DateTime<Utc> {
        match self {
            Self::Success { when } | Self::Failure { when, .. } => *when,
        }
    }

    pub fn error_detail(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_detail, .. } => Some(error_detail),
        }
    }
}

/// Ledger document for one file identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionRecord {
    /// Stable file identity (object name). Immutable once written.
    pub file_id: String,

    #[serde(flatten)]
    pub outcome: Outcome,

    /// Arrival times of repeat deliveries, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplication_attempts: Vec<DateTime<Utc>>,
}

impl IngestionRecord {
    pub fn success(file_id: impl Into<String>, when: DateTime<Utc>) -> Self {
        Self {
            file_id: file_id.into(),
            outcome: Outcome::Success { when },
            duplication_attempts: Vec::new(),
        }
    }

    pub fn failure(
        file_id: impl Into<String>,
        when: DateTime<Utc>,
        error_detail: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            outcome: Outcome::Failure {
                when,
                error_detail: error_detail.into(),
            },
            duplication_attempts: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.outcome.status()
    }

    /// Serialize to the JSON document stored in the ledger.
    pub fn to_json(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a ledger document.
    pub fn from_json(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
