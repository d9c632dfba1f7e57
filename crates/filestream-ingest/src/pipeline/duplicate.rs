use crate::ledger::Ledger;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use filestream_core::metrics::DUPLICATES_TOTAL;

/// Append `now` to the record's `duplication_attempts` and log a warning.
///
/// Read-then-update, not atomic: two duplicates racing each other can lose
/// one attempt timestamp. The outcome fields are never touched.
///
/// Returns the number of attempts now on record.
pub async fn record_duplicate(
    ledger: &dyn Ledger,
    key: &str,
    file_id: &str,
    now: DateTime<Utc>,
) -> Result<usize> {
    let record = ledger
        .get(key)
        .await?
        .ok_or_else(|| Error::NotFound(key.to_string()))?;

    let mut attempts = record.duplication_attempts;
    attempts.push(now);
    ledger.update_duplication_attempts(key, &attempts).await?;

    metrics::counter!(DUPLICATES_TOTAL).increment(1);
    tracing::warn!(
        file_id = %file_id,
        status = record.outcome.status().as_str(),
        attempts = attempts.len(),
        "Duplication attempt while streaming file '{}'",
        file_id
    );

    Ok(attempts.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use chrono::TimeZone;
    use filestream_core::IngestionRecord;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_first_duplicate_starts_sequence() {
        let ledger = MemoryLedger::new();
        let key = "streaming_files/a.json";
        ledger.insert(key, IngestionRecord::success("a.json", t(10)));

        let count = record_duplicate(&ledger, key, "a.json", t(20)).await.unwrap();

        assert_eq!(count, 1);
        let stored = ledger.get(key).await.unwrap().unwrap();
        assert_eq!(stored.duplication_attempts, vec![t(20)]);
        assert_eq!(stored.outcome.when(), t(10));
    }

    #[tokio::test]
    async fn test_later_duplicates_append_in_order() {
        let ledger = MemoryLedger::new();
        let key = "streaming_files/a.json";
        ledger.insert(key, IngestionRecord::failure("a.json", t(10), "boom"));

        record_duplicate(&ledger, key, "a.json", t(20)).await.unwrap();
        let count = record_duplicate(&ledger, key, "a.json", t(30)).await.unwrap();

        assert_eq!(count, 2);
        let stored = ledger.get(key).await.unwrap().unwrap();
        assert_eq!(stored.duplication_attempts, vec![t(20), t(30)]);
        assert_eq!(stored.outcome.error_detail(), Some("boom"));
        assert_eq!(ledger.set_count(), 0);
    }

    #[tokio::test]
    async fn test_vanished_record_is_fatal() {
        let ledger = MemoryLedger::new();
        let err = record_duplicate(&ledger, "streaming_files/gone.json", "gone.json", t(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
