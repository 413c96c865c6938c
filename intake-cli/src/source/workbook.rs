//! calamine-backed spreadsheet source (xlsx, xlsm, xlsb, xls, ods)

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calamine::{Data, Reader, Sheets, open_workbook_auto_from_rs};

use super::SheetSource;
use crate::error::IntakeError;
use crate::frame::{Cell, Frame};

/// An opened workbook on local disk
pub struct WorkbookSource {
    path: PathBuf,
    workbook: Sheets<Cursor<Vec<u8>>>,
}

impl WorkbookSource {
    /// Open a workbook, failing with [`IntakeError::SourceNotFound`] when the path is
    /// missing, unreadable, or a zero-byte file
    ///
    /// The format is detected from the file content, so the extension does not matter.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path).map_err(|_| IntakeError::SourceNotFound {
            path: path.to_path_buf(),
        })?;
        if !metadata.is_file() || metadata.len() == 0 {
            return Err(IntakeError::SourceNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let bytes = std::fs::read(path).map_err(|_| IntakeError::SourceNotFound {
            path: path.to_path_buf(),
        })?;
        let workbook =
            open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| IntakeError::Workbook {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            workbook,
        })
    }
}

impl SheetSource for WorkbookSource {
    fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    fn load_sheet(&mut self, sheet: &str) -> Result<Frame> {
        let range = self
            .workbook
            .worksheet_range(sheet)
            .with_context(|| format!("Failed to read sheet: {}", sheet))?;

        let mut rows = range.rows();
        let headers = match rows.next() {
            Some(header_row) => header_names(header_row),
            None => return Ok(Frame::default()),
        };

        let data: Vec<Vec<Cell>> = rows
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        log::debug!(
            "Loaded sheet '{}' from {}: {} columns, {} rows",
            sheet,
            self.path.display(),
            headers.len(),
            data.len()
        );

        Ok(Frame::new(headers, data))
    }
}

/// Header cells as column names; blank headers get a positional placeholder
fn header_names(row: &[Data]) -> Vec<String> {
    row.iter()
        .enumerate()
        .map(|(idx, cell)| match cell_text(cell) {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("Unnamed: {}", idx),
        })
        .collect()
}

/// Render a cell as text; empty strings, blanks and error cells are null
fn cell_text(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            // Whole numbers keep their integer form ("12", not "12.0")
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                Some((*f as i64).to_string())
            } else {
                Some(f.to_string())
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(format!("{}", dt)),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}
