//! Spreadsheet sources
//!
//! The pipeline only needs two things from a spreadsheet: its sheet names in workbook
//! order, and one sheet loaded as a header row plus data rows.

pub mod workbook;

pub use workbook::WorkbookSource;

use anyhow::Result;

use crate::frame::Frame;

/// Read access to a single spreadsheet file
pub trait SheetSource {
    /// Sheet names in workbook order
    fn sheet_names(&self) -> Vec<String>;

    /// Load a sheet; the first row becomes the column names
    fn load_sheet(&mut self, sheet: &str) -> Result<Frame>;
}
