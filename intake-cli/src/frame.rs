//! In-memory tabular frame and the per-run column binding
//!
//! Cells are text or null. The frame only offers the handful of operations the
//! pipeline needs: filter, projection with rename, and counts.

use serde::Serialize;

/// A single cell; `None` is null
pub type Cell = Option<String>;

/// Canonical column names of the intermediate table
pub mod canonical {
    pub const COLUMN_A: &str = "column_a";
    pub const COLUMN_B: &str = "column_b";
    pub const FLAG: &str = "flag";
}

/// Error when a frame operation names a column the frame does not have
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownColumn {
    pub column: String,
    pub available: Vec<String>,
}

impl std::fmt::Display for UnknownColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown column '{}' (available: {})",
            self.column,
            self.available.join(", ")
        )
    }
}

impl std::error::Error for UnknownColumn {}

/// Ordered columns plus rows of cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    /// Build a frame; rows shorter than the header are padded with nulls, longer rows truncated
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Index of the first column with exactly this name
    pub fn column_index(&self, column: &str) -> Result<usize, UnknownColumn> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| UnknownColumn {
                column: column.to_string(),
                available: self.columns.clone(),
            })
    }

    /// Keep the rows whose value in `column` satisfies the predicate
    pub fn filter<P>(self, column: &str, predicate: P) -> Result<Frame, UnknownColumn>
    where
        P: Fn(Option<&str>) -> bool,
    {
        let idx = self.column_index(column)?;
        let rows = self
            .rows
            .into_iter()
            .filter(|row| predicate(row[idx].as_deref()))
            .collect();

        Ok(Frame {
            columns: self.columns,
            rows,
        })
    }

    /// Project `(source, alias)` pairs into a new frame, in the order given
    pub fn select_and_rename(&self, projection: &[(&str, &str)]) -> Result<Frame, UnknownColumn> {
        let indices = projection
            .iter()
            .map(|(source, _)| self.column_index(source))
            .collect::<Result<Vec<_>, _>>()?;

        let columns = projection
            .iter()
            .map(|(_, alias)| alias.to_string())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Frame { columns, rows })
    }

    /// Number of non-null cells in `column`
    pub fn count_non_null(&self, column: &str) -> Result<usize, UnknownColumn> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().filter(|row| row[idx].is_some()).count())
    }
}

/// Resolved source headers for each canonical column, built once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    pub column_a: String,
    pub column_b: String,
    pub flag: Option<String>,
}

impl ColumnBinding {
    /// `(source header, canonical name)` pairs; `flag` only when one was resolved
    pub fn projection(&self) -> Vec<(&str, &str)> {
        let mut pairs = vec![
            (self.column_a.as_str(), canonical::COLUMN_A),
            (self.column_b.as_str(), canonical::COLUMN_B),
        ];
        if let Some(flag) = &self.flag {
            pairs.push((flag.as_str(), canonical::FLAG));
        }
        pairs
    }
}
