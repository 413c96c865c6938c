//! Change-gated audit history
//!
//! A run adds a history record only when its `(filename, flagged_line_count)` differs
//! from the latest record already stored. Older records never influence the decision.
//!
//! The read of the latest record and the append are not atomic. Two concurrent runs
//! against the same history table may both append; callers serialize runs.

use anyhow::Result;
use chrono::{Local, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::store::{TableName, TableStore};

/// Format of `processing_timestamp` (minute precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One row of the history table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub filename: String,
    pub processing_timestamp: String,
    pub flagged_line_count: i64,
}

impl HistoryRecord {
    pub fn new(filename: &str, flagged_line_count: i64, at: NaiveDateTime) -> Self {
        Self {
            filename: filename.to_string(),
            processing_timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            flagged_line_count,
        }
    }
}

/// Source of wall-clock time for history timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Current time in a fixed timezone, or the machine's local zone when none is set
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    pub timezone: Option<Tz>,
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// How a candidate compares to the latest stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    /// No readable prior record
    NoHistory,
    /// Filename or count differs from the latest record
    Changed,
    /// Filename and count both equal the latest record
    Unchanged,
}

impl Change {
    pub fn should_append(self) -> bool {
        !matches!(self, Change::Unchanged)
    }
}

/// Compare a candidate with the latest record; timestamps are ignored
pub fn compare(latest: Option<&HistoryRecord>, candidate: &HistoryRecord) -> Change {
    match latest {
        None => Change::NoHistory,
        Some(last)
            if last.filename == candidate.filename
                && last.flagged_line_count == candidate.flagged_line_count =>
        {
            Change::Unchanged
        }
        Some(_) => Change::Changed,
    }
}

/// What the gate did with the candidate record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GateOutcome {
    Appended { record: HistoryRecord, change: Change },
    Skipped { record: HistoryRecord },
}

impl GateOutcome {
    pub fn record(&self) -> &HistoryRecord {
        match self {
            GateOutcome::Appended { record, .. } | GateOutcome::Skipped { record } => record,
        }
    }

    pub fn appended(&self) -> bool {
        matches!(self, GateOutcome::Appended { .. })
    }
}

/// Decides whether a run extends the history table
pub struct HistoryGate<'a, S: TableStore + ?Sized> {
    store: &'a S,
    table: &'a TableName,
}

impl<'a, S: TableStore + ?Sized> HistoryGate<'a, S> {
    pub fn new(store: &'a S, table: &'a TableName) -> Self {
        Self { store, table }
    }

    /// Build the candidate, compare it with the latest record, append if it changed
    ///
    /// The timestamp is taken once, before the comparison. A history table that is
    /// missing or unreadable counts as empty. Skipping writes nothing.
    pub async fn decide_and_apply(
        &self,
        filename: &str,
        flagged_line_count: i64,
        clock: &dyn Clock,
    ) -> Result<GateOutcome> {
        let candidate = HistoryRecord::new(filename, flagged_line_count, clock.now());

        let latest = match self.store.read_latest_history(self.table).await {
            Ok(latest) => latest,
            Err(e) => {
                log::warn!(
                    "Cannot read history (table '{}' may not exist): {:#}. The first record will be added.",
                    self.table,
                    e
                );
                None
            }
        };

        let change = compare(latest.as_ref(), &candidate);
        match change {
            Change::NoHistory => log::info!("No prior history in '{}'", self.table),
            Change::Changed => log::info!("Change detected compared to the most recent record"),
            Change::Unchanged => log::info!("No change detected compared to the most recent record"),
        }

        if !change.should_append() {
            log::info!(
                "Record not appended to '{}' as no significant change was detected",
                self.table
            );
            return Ok(GateOutcome::Skipped { record: candidate });
        }

        log::info!("Appending record to '{}'", self.table);
        self.store.append_history(self.table, &candidate).await?;

        Ok(GateOutcome::Appended {
            record: candidate,
            change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 42)
            .unwrap()
    }

    fn history_table() -> TableName {
        TableName::parse("history_log_table_name").unwrap()
    }

    async fn history_rows(store: &SqliteStore, table: &TableName) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table.quoted()))
            .fetch_one(store.pool())
            .await
            .unwrap()
    }

    #[test]
    fn test_timestamp_minute_precision() {
        let record = HistoryRecord::new("q1.xlsx", 5, at(1, 9, 7));
        assert_eq!(record.processing_timestamp, "2026-03-01 09:07");
    }

    #[test]
    fn test_compare_ignores_timestamp() {
        let last = HistoryRecord::new("q1.xlsx", 5, at(1, 9, 0));
        let same = HistoryRecord::new("q1.xlsx", 5, at(2, 10, 30));
        assert_eq!(compare(Some(&last), &same), Change::Unchanged);

        let other_file = HistoryRecord::new("q2.xlsx", 5, at(2, 10, 30));
        assert_eq!(compare(Some(&last), &other_file), Change::Changed);

        assert_eq!(compare(None, &same), Change::NoHistory);
    }

    #[tokio::test]
    async fn test_first_run_appends() {
        let store = SqliteStore::in_memory().await.unwrap();
        let table = history_table();
        let gate = HistoryGate::new(&store, &table);

        let outcome = gate
            .decide_and_apply("q1.xlsx", 5, &FixedClock(at(1, 9, 0)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            GateOutcome::Appended {
                record: HistoryRecord::new("q1.xlsx", 5, at(1, 9, 0)),
                change: Change::NoHistory,
            }
        );
        assert_eq!(history_rows(&store, &table).await, 1);
    }

    #[tokio::test]
    async fn test_identical_run_is_skipped() {
        let store = SqliteStore::in_memory().await.unwrap();
        let table = history_table();
        let gate = HistoryGate::new(&store, &table);

        gate.decide_and_apply("q1.xlsx", 5, &FixedClock(at(1, 9, 0)))
            .await
            .unwrap();
        let outcome = gate
            .decide_and_apply("q1.xlsx", 5, &FixedClock(at(2, 9, 0)))
            .await
            .unwrap();

        assert!(!outcome.appended());
        assert_eq!(outcome.record().processing_timestamp, "2026-03-02 09:00");
        assert_eq!(history_rows(&store, &table).await, 1);

        let latest = store.read_latest_history(&table).await.unwrap().unwrap();
        assert_eq!(latest.processing_timestamp, "2026-03-01 09:00");
    }

    #[tokio::test]
    async fn test_changed_count_appends() {
        let store = SqliteStore::in_memory().await.unwrap();
        let table = history_table();
        let gate = HistoryGate::new(&store, &table);

        gate.decide_and_apply("q1.xlsx", 5, &FixedClock(at(1, 9, 0)))
            .await
            .unwrap();
        let outcome = gate
            .decide_and_apply("q1.xlsx", 6, &FixedClock(at(2, 9, 0)))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            GateOutcome::Appended {
                change: Change::Changed,
                ..
            }
        ));
        assert_eq!(history_rows(&store, &table).await, 2);
        assert_eq!(
            store.read_latest_history(&table).await.unwrap(),
            Some(HistoryRecord::new("q1.xlsx", 6, at(2, 9, 0)))
        );
    }

    #[tokio::test]
    async fn test_only_latest_record_is_consulted() {
        let store = SqliteStore::in_memory().await.unwrap();
        let table = history_table();
        let gate = HistoryGate::new(&store, &table);

        // A -> B -> A: the third run matches an older record but not the latest
        for (day, file) in [(1, "a.xlsx"), (2, "b.xlsx"), (3, "a.xlsx")] {
            let outcome = gate
                .decide_and_apply(file, 1, &FixedClock(at(day, 8, 0)))
                .await
                .unwrap();
            assert!(outcome.appended(), "run on day {} was skipped", day);
        }
        assert_eq!(history_rows(&store, &table).await, 3);
    }

    #[tokio::test]
    async fn test_unreadable_history_is_treated_as_empty() {
        let store = SqliteStore::in_memory().await.unwrap();
        let table = history_table();

        // A table without the expected columns makes the latest-record query fail
        sqlx::query(&format!("CREATE TABLE {} (something TEXT)", table.quoted()))
            .execute(store.pool())
            .await
            .unwrap();
        assert!(store.read_latest_history(&table).await.is_err());

        let gate = HistoryGate::new(&store, &table);
        let result = gate
            .decide_and_apply("q1.xlsx", 5, &FixedClock(at(1, 9, 0)))
            .await;

        // The read failure is absorbed; the append then fails against the broken schema
        assert!(result.is_err());
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Failed to append"), "{}", message);
    }
}
