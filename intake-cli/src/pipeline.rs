//! Spreadsheet to intermediate-table ingestion
//!
//! Steps: resolve the sheet, load it, drop rows without a primary value, resolve the
//! remaining columns, project onto canonical names, overwrite the intermediate table.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::error::IntakeError;
use crate::frame::{ColumnBinding, Frame};
use crate::matching::{FlagRule, resolve_one};
use crate::source::SheetSource;
use crate::store::{TableName, TableStore};

/// What the pipeline looks for in the spreadsheet
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub sheet_prefix: String,
    pub column_a: String,
    pub column_b: String,
    pub flag: FlagRule,
    pub intermediate_table: TableName,
}

/// Sheet resolved, rows filtered and projected, not yet written
#[derive(Debug, Clone)]
pub struct PreparedSheet {
    pub sheet: String,
    pub binding: ColumnBinding,
    pub raw_rows: usize,
    pub projected: Frame,
    pub flagged_line_count: i64,
}

/// Summary of one ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub filename: String,
    pub sheet: String,
    pub binding: ColumnBinding,
    pub raw_rows: usize,
    pub valid_rows: usize,
    pub flagged_line_count: i64,
    pub intermediate_table: String,
}

/// A row is kept only when its primary value is present and not made of spaces alone
///
/// Only U+0020 counts as blank; tabs, newlines and non-breaking spaces are content.
pub fn is_valid_primary(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim_matches(' ').is_empty())
}

/// File name as recorded in history: the last path component
pub fn source_filename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Resolve, load, filter and project one sheet
pub fn prepare<S: SheetSource + ?Sized>(
    source: &mut S,
    source_path: &Path,
    settings: &IngestSettings,
) -> Result<PreparedSheet> {
    let sheet_names = source.sheet_names();
    log::info!(
        "Available sheet names in '{}': {:?}",
        source_filename(source_path),
        sheet_names
    );

    let sheet = resolve_one(&settings.sheet_prefix, &sheet_names)
        .map_err(|error| IntakeError::SheetNotMatched {
            path: source_path.to_path_buf(),
            error,
        })?
        .to_string();
    log::info!("Matching sheet found: '{}'", sheet);

    let raw = source.load_sheet(&sheet)?;
    let raw_rows = raw.count();
    log::info!("Rows read before filtering: {}", raw_rows);

    let column_not_matched = |error| IntakeError::ColumnNotMatched {
        sheet: sheet.clone(),
        error,
    };

    let column_a = resolve_one(&settings.column_a, raw.columns())
        .map_err(column_not_matched)?
        .to_string();

    let valid = raw.filter(&column_a, is_valid_primary)?;
    log::info!(
        "Valid rows after filtering on '{}': {}",
        column_a,
        valid.count()
    );

    let column_b = resolve_one(&settings.column_b, valid.columns())
        .map_err(column_not_matched)?
        .to_string();
    let flag = settings
        .flag
        .find_flag_column(valid.columns())
        .map(str::to_string);

    let binding = ColumnBinding {
        column_a,
        column_b,
        flag,
    };

    let flagged_line_count = match &binding.flag {
        Some(flag) if valid.count() > 0 => valid.count_non_null(flag)? as i64,
        _ => 0,
    };
    log::info!("Calculated statistics: flagged_lines={}", flagged_line_count);

    let projected = valid.select_and_rename(&binding.projection())?;

    Ok(PreparedSheet {
        sheet,
        binding,
        raw_rows,
        projected,
        flagged_line_count,
    })
}

/// Run [`prepare`] and overwrite the intermediate table with the projected rows
pub async fn ingest<S, T>(
    source: &mut S,
    store: &T,
    source_path: &Path,
    settings: &IngestSettings,
) -> Result<IngestReport>
where
    S: SheetSource + ?Sized,
    T: TableStore + ?Sized,
{
    let prepared = prepare(source, source_path, settings)?;

    log::info!(
        "Columns for intermediate table '{}': {:?}",
        settings.intermediate_table,
        prepared.projected.columns()
    );
    store
        .write_overwrite(&settings.intermediate_table, &prepared.projected)
        .await?;

    Ok(IngestReport {
        filename: source_filename(source_path),
        sheet: prepared.sheet,
        binding: prepared.binding,
        raw_rows: prepared.raw_rows,
        valid_rows: prepared.projected.count(),
        flagged_line_count: prepared.flagged_line_count,
        intermediate_table: settings.intermediate_table.to_string(),
    })
}
