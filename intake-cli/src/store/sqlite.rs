//! SQLite implementation of the table store

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use super::{TableName, TableStore, quote_ident};
use crate::frame::{Cell, Frame};
use crate::history::HistoryRecord;

/// Table store over a single SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        log::debug!("Opened SQLite store at {}", path.display());
        Ok(Self { pool })
    }

    /// Private in-memory database; one connection so every query sees the same data
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection; further use of the store fails
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TableStore for SqliteStore {
    async fn write_overwrite(&self, table: &TableName, frame: &Frame) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to start transaction")?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table.quoted()))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to drop table {}", table))?;

        let column_defs = frame
            .columns()
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        sqlx::query(&format!("CREATE TABLE {} ({})", table.quoted(), column_defs))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to create table {}", table))?;

        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.quoted(),
            frame
                .columns()
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            vec!["?"; frame.columns().len()].join(", ")
        );

        for row in frame.rows() {
            let mut query = sqlx::query(&insert);
            for cell in row {
                query = query.bind(cell.clone());
            }
            query
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to insert into {}", table))?;
        }

        tx.commit().await.context("Failed to commit transaction")?;

        log::debug!("Overwrote {} with {} rows", table, frame.count());
        Ok(())
    }

    async fn read_table(&self, table: &TableName) -> Result<Frame> {
        // Column names come from the table definition so an empty table keeps its schema
        let columns: Vec<String> = sqlx::query(&format!(
            "SELECT name FROM pragma_table_info('{}') ORDER BY cid",
            table.as_str()
        ))
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to read schema of {}", table))?
        .iter()
        .map(|row| row.try_get::<String, _>("name"))
        .collect::<Result<_, _>>()?;

        if columns.is_empty() {
            anyhow::bail!("Table {} does not exist", table);
        }

        // Overwrites replace the schema under the same name, so the statement is not cached
        let select = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            table.quoted()
        );
        let rows = sqlx::query(&select)
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read table {}", table))?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cells: Vec<Cell> = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                cells.push(row.try_get::<Option<String>, _>(idx)?);
            }
            data.push(cells);
        }

        Ok(Frame::new(columns, data))
    }

    async fn append_history(&self, table: &TableName, record: &HistoryRecord) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                filename TEXT,
                processing_timestamp TEXT,
                flagged_line_count INTEGER
            )
            "#,
            table.quoted()
        ))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create history table {}", table))?;

        sqlx::query(&format!(
            "INSERT INTO {} (filename, processing_timestamp, flagged_line_count) VALUES (?, ?, ?)",
            table.quoted()
        ))
        .bind(&record.filename)
        .bind(&record.processing_timestamp)
        .bind(record.flagged_line_count)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to append to history table {}", table))?;

        Ok(())
    }

    async fn read_latest_history(&self, table: &TableName) -> Result<Option<HistoryRecord>> {
        // Same-minute runs share a timestamp; rowid breaks the tie toward the newest insert
        let row = sqlx::query(&format!(
            r#"
            SELECT filename, processing_timestamp, flagged_line_count
            FROM {}
            ORDER BY processing_timestamp DESC, rowid DESC
            LIMIT 1
            "#,
            table.quoted()
        ))
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to read latest record from {}", table))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(HistoryRecord {
            filename: row.try_get::<Option<String>, _>("filename")?.unwrap_or_default(),
            processing_timestamp: row
                .try_get::<Option<String>, _>("processing_timestamp")?
                .unwrap_or_default(),
            flagged_line_count: row
                .try_get::<Option<i64>, _>("flagged_line_count")?
                .unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> TableName {
        TableName::parse(name).unwrap()
    }

    fn record(filename: &str, timestamp: &str, count: i64) -> HistoryRecord {
        HistoryRecord {
            filename: filename.to_string(),
            processing_timestamp: timestamp.to_string(),
            flagged_line_count: count,
        }
    }

    #[tokio::test]
    async fn test_overwrite_replaces_schema_and_rows() {
        let store = SqliteStore::in_memory().await.unwrap();
        let t = table("intermediate");

        let first = Frame::new(
            vec!["column_a".into(), "column_b".into(), "flag".into()],
            vec![
                vec![Some("A1".into()), Some("B1".into()), Some("x".into())],
                vec![Some("A2".into()), None, None],
            ],
        );
        store.write_overwrite(&t, &first).await.unwrap();
        assert_eq!(store.read_table(&t).await.unwrap(), first);

        let second = Frame::new(
            vec!["column_a".into(), "column_b".into()],
            vec![vec![Some("Z".into()), Some("9".into())]],
        );
        store.write_overwrite(&t, &second).await.unwrap();

        let read = store.read_table(&t).await.unwrap();
        assert_eq!(read.columns(), &["column_a".to_string(), "column_b".to_string()]);
        assert_eq!(read, second);
    }

    #[tokio::test]
    async fn test_read_back_after_flag_column_appears() {
        let store = SqliteStore::in_memory().await.unwrap();
        let t = table("intermediate");

        let without_flag = Frame::new(
            vec!["column_a".into(), "column_b".into()],
            vec![vec![Some("A1".into()), Some("B1".into())]],
        );
        store.write_overwrite(&t, &without_flag).await.unwrap();
        assert_eq!(store.read_table(&t).await.unwrap(), without_flag);

        let with_flag = Frame::new(
            vec!["column_a".into(), "column_b".into(), "flag".into()],
            vec![
                vec![Some("A1".into()), Some("B1".into()), Some("x".into())],
                vec![Some("A2".into()), None, None],
            ],
        );
        store.write_overwrite(&t, &with_flag).await.unwrap();
        assert_eq!(store.read_table(&t).await.unwrap(), with_flag);
    }

    #[tokio::test]
    async fn test_overwrite_with_no_rows_keeps_schema() {
        let store = SqliteStore::in_memory().await.unwrap();
        let t = table("intermediate");
        let empty = Frame::new(vec!["column_a".into(), "column_b".into()], Vec::new());

        store.write_overwrite(&t, &empty).await.unwrap();

        let read = store.read_table(&t).await.unwrap();
        assert_eq!(read.columns().len(), 2);
        assert_eq!(read.count(), 0);
    }

    #[tokio::test]
    async fn test_read_missing_table_fails() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.read_table(&table("nope")).await.is_err());
        assert!(store.read_latest_history(&table("nope")).await.is_err());
    }

    #[tokio::test]
    async fn test_latest_history_orders_by_timestamp() {
        let store = SqliteStore::in_memory().await.unwrap();
        let t = table("history");

        store.append_history(&t, &record("b.xlsx", "2026-03-02 09:00", 2)).await.unwrap();
        store.append_history(&t, &record("a.xlsx", "2026-03-01 09:00", 1)).await.unwrap();

        let latest = store.read_latest_history(&t).await.unwrap();
        assert_eq!(latest, Some(record("b.xlsx", "2026-03-02 09:00", 2)));
    }

    #[tokio::test]
    async fn test_latest_history_same_minute_prefers_newest_insert() {
        let store = SqliteStore::in_memory().await.unwrap();
        let t = table("history");

        store.append_history(&t, &record("q1.xlsx", "2026-03-02 09:00", 5)).await.unwrap();
        store.append_history(&t, &record("q1.xlsx", "2026-03-02 09:00", 6)).await.unwrap();

        let latest = store.read_latest_history(&t).await.unwrap().unwrap();
        assert_eq!(latest.flagged_line_count, 6);
    }

    #[tokio::test]
    async fn test_latest_history_empty_table() {
        let store = SqliteStore::in_memory().await.unwrap();
        let t = table("history");

        sqlx::query(
            "CREATE TABLE \"history\" (filename TEXT, processing_timestamp TEXT, flagged_line_count INTEGER)",
        )
        .execute(store.pool())
        .await
        .unwrap();

        assert_eq!(store.read_latest_history(&t).await.unwrap(), None);
    }
}
