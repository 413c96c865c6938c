//! Persistent table store
//!
//! Two tables are written per run: the intermediate snapshot (replaced wholesale) and
//! the history log (append-only). Neither is locked; runs against the same store must
//! be serialized by whoever schedules them.

pub mod sqlite;

pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::IntakeError;
use crate::frame::Frame;
use crate::history::HistoryRecord;

/// Table name that is safe to splice into SQL
///
/// Accepts `table` or `schema.table`; the latter is flattened to `schema__table`
/// since a single SQLite file has no schemas of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    pub fn parse(raw: &str) -> Result<Self, IntakeError> {
        let invalid = || IntakeError::InvalidTableName {
            name: raw.to_string(),
        };

        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|p| is_identifier(p)) {
            return Err(invalid());
        }

        Ok(Self(parts.join("__")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted identifier for SQL
    pub fn quoted(&self) -> String {
        quote_ident(&self.0)
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote an arbitrary column or table identifier
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Table operations the pipeline and history gate rely on
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Replace the table's schema and contents with `frame`
    async fn write_overwrite(&self, table: &TableName, frame: &Frame) -> Result<()>;

    /// Read a whole table back, columns in table order, rows in insertion order
    async fn read_table(&self, table: &TableName) -> Result<Frame>;

    /// Append one history record, creating the table on first use
    async fn append_history(&self, table: &TableName, record: &HistoryRecord) -> Result<()>;

    /// Most recent history record by `processing_timestamp`
    ///
    /// Errors when the table is missing or unreadable; `Ok(None)` when it is empty.
    async fn read_latest_history(&self, table: &TableName) -> Result<Option<HistoryRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_plain() {
        let name = TableName::parse("intermediate_table_name").unwrap();
        assert_eq!(name.as_str(), "intermediate_table_name");
        assert_eq!(name.quoted(), "\"intermediate_table_name\"");
    }

    #[test]
    fn test_table_name_schema_is_flattened() {
        let name = TableName::parse("prod_repo.history_log").unwrap();
        assert_eq!(name.as_str(), "prod_repo__history_log");
    }

    #[test]
    fn test_table_name_rejects_sql() {
        for raw in ["", "a.b.c", "1table", "t; DROP TABLE x", "t\"x", "name-with-dash", ".t"] {
            assert!(
                matches!(TableName::parse(raw), Err(IntakeError::InvalidTableName { .. })),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
