//! ClickHouse sink.
//!
//! Each file becomes one single-row insert tagged with
//! `insert_deduplication_token = <file_id>`. ClickHouse drops a repeated
//! block with the same token, so a re-executed insert for the same file
//! leaves exactly one row. The table created by
//! [`ClickHouseSink::ensure_table`] also orders by `row_id` on a
//! `ReplacingMergeTree`, so duplicates that slip outside the dedup window
//! collapse on merge.

use super::retry::{BackoffConfig, retry_within_deadline};
use super::{RowError, Sink, SinkError, SinkRow, TableRef};
use async_trait::async_trait;
use clickhouse::Client;
use clickhouse::error::Error as ClickHouseError;
use std::time::Duration;

/// Configuration for the ClickHouse sink.
#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    /// ClickHouse server URL (e.g., "http://localhost:8123")
    pub url: String,

    /// Optional credentials
    pub user: Option<String>,
    pub password: Option<String>,

    /// Backoff between retried inserts
    pub backoff: BackoffConfig,
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8123".to_string(),
            user: None,
            password: None,
            backoff: BackoffConfig::DEFAULT,
        }
    }
}

/// Sink writing one row per file into ClickHouse.
#[derive(Clone)]
pub struct ClickHouseSink {
    client: Client,
    backoff: BackoffConfig,
}

impl ClickHouseSink {
    pub fn new(config: ClickHouseConfig) -> Self {
        let mut client = Client::default().with_url(&config.url);
        if let Some(user) = &config.user {
            client = client.with_user(user);
        }
        if let Some(password) = &config.password {
            client = client.with_password(password);
        }

        tracing::info!("ClickHouse sink initialized: url={}", config.url);

        Self {
            client,
            backoff: config.backoff,
        }
    }

    /// Create the target table if it does not exist.
    pub async fn ensure_table(&self, table: &TableRef) -> Result<(), SinkError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {}.{} (
                row_id String,
                file_id String,
                bucket String,
                payload String,
                ingested_at DateTime
            )
            ENGINE = ReplacingMergeTree
            ORDER BY row_id
            SETTINGS non_replicated_deduplication_window = 10000",
            table.database, table.table
        );
        self.client.query(&ddl).execute().await.map_err(classify)?;
        tracing::info!("Ensured sink table {}", table);
        Ok(())
    }

    /// Check if ClickHouse is reachable.
    pub async fn health_check(&self) -> Result<bool, SinkError> {
        let result: u8 = self
            .client
            .query("SELECT 1")
            .fetch_one()
            .await
            .map_err(classify)?;
        Ok(result == 1)
    }

    /// One insert attempt for one row, deduplicated by its `row_id`.
    async fn insert_once(&self, table: &TableRef, row: &SinkRow) -> Result<(), ClickHouseError> {
        let client = self
            .client
            .clone()
            .with_database(&table.database)
            .with_option("insert_deduplication_token", row.row_id.as_str());

        let mut insert = client.insert(&table.table)?;
        insert.write(row).await?;
        insert.end().await
    }
}

#[async_trait]
impl Sink for ClickHouseSink {
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[SinkRow],
        deadline: Duration,
    ) -> Result<Vec<RowError>, SinkError> {
        let mut row_errors = Vec::new();

        for row in rows {
            let attempt = retry_within_deadline(deadline, self.backoff, move || async move {
                match self.insert_once(table, row).await {
                    Ok(()) => Ok(None),
                    Err(e) => classify_insert(e, &row.row_id).map(Some),
                }
            })
            .await?;

            if let Some(rejected) = attempt {
                tracing::warn!("ClickHouse rejected {}: {}", row.row_id, rejected.reason);
                row_errors.push(rejected);
            }
        }

        Ok(row_errors)
    }
}

/// Server error codes that describe load or cluster state, not the data.
const RETRYABLE_CODES: &[u32] = &[
    159, // TIMEOUT_EXCEEDED
    202, // TOO_MANY_SIMULTANEOUS_QUERIES
    203, // NO_FREE_CONNECTION
    209, // SOCKET_TIMEOUT
    210, // NETWORK_ERROR
    241, // MEMORY_LIMIT_EXCEEDED
    242, // TABLE_IS_READ_ONLY
    252, // TOO_MANY_PARTS
    285, // TOO_FEW_LIVE_REPLICAS
    319, // UNKNOWN_STATUS_OF_INSERT
    425, // SYSTEM_ERROR
    999, // KEEPER_EXCEPTION
];

const UNAVAILABLE_MARKERS: &[&str] = &[
    "502 Bad Gateway",
    "503 Service Unavailable",
    "504 Gateway Timeout",
];

fn classify(err: ClickHouseError) -> SinkError {
    match err {
        ClickHouseError::Network(_) | ClickHouseError::TimedOut => {
            SinkError::Transient(err.to_string())
        }
        ClickHouseError::BadResponse(ref reason) if is_retryable_response(reason) => {
            SinkError::Transient(err.to_string())
        }
        other => SinkError::Permanent(other.to_string()),
    }
}

/// Classify a failed insert attempt.
///
/// A non-2xx answer caused by the row itself (parse, type, unknown column)
/// is a [`RowError`]; overload and availability answers are retried.
fn classify_insert(err: ClickHouseError, row_id: &str) -> Result<RowError, SinkError> {
    match err {
        ClickHouseError::BadResponse(reason) if !is_retryable_response(&reason) => Ok(RowError {
            row_id: row_id.to_string(),
            reason,
        }),
        other => Err(classify(other)),
    }
}

fn is_retryable_response(reason: &str) -> bool {
    match exception_code(reason) {
        Some(code) => RETRYABLE_CODES.contains(&code),
        None => UNAVAILABLE_MARKERS.iter().any(|m| reason.contains(m)),
    }
}

/// The `Code: N` prefix of a server exception, if present.
fn exception_code(reason: &str) -> Option<u32> {
    let rest = &reason[reason.find("Code: ")? + "Code: ".len()..];
    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .map_or(rest, |end| &rest[..end]);
    digits.parse().ok()
}
