//! Fatal run errors

use std::path::PathBuf;

use crate::matching::NotFoundError;

/// Errors that abort an intake run
///
/// A failed read of the history table is deliberately not represented here: the history
/// gate treats it as "no prior record" and carries on.
#[derive(Debug)]
pub enum IntakeError {
    /// Source path missing, unreadable, or empty
    SourceNotFound { path: PathBuf },
    /// The spreadsheet could not be decoded
    Workbook { path: PathBuf, message: String },
    /// No sheet name starts with the configured prefix
    SheetNotMatched { path: PathBuf, error: NotFoundError },
    /// A required column could not be resolved from the headers
    ColumnNotMatched { sheet: String, error: NotFoundError },
    /// A configured table name is not a plain identifier
    InvalidTableName { name: String },
}

impl std::fmt::Display for IntakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntakeError::SourceNotFound { path } => {
                write!(f, "Spreadsheet not found or empty: {}", path.display())
            }
            IntakeError::Workbook { path, message } => {
                write!(f, "Failed to read spreadsheet {}: {}", path.display(), message)
            }
            IntakeError::SheetNotMatched { path, error } => {
                write!(
                    f,
                    "No sheet found starting with '{}' (normalized: '{}') in '{}'. Available sheets: [{}]",
                    error.target,
                    error.normalized_target,
                    path.display(),
                    error.available.join(", ")
                )
            }
            IntakeError::ColumnNotMatched { sheet, error } => {
                write!(
                    f,
                    "Column '{}' (normalized: '{}') not found in sheet '{}'. Headers: [{}]",
                    error.target,
                    error.normalized_target,
                    sheet,
                    error.available.join(", ")
                )
            }
            IntakeError::InvalidTableName { name } => {
                write!(
                    f,
                    "Invalid table name '{}' - expected letters, digits and underscores, optionally 'schema.table'",
                    name
                )
            }
        }
    }
}

// The match diagnostics are already in the message, so no variant exposes a source
impl std::error::Error for IntakeError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found(target: &str, normalized: &str, available: &[&str]) -> NotFoundError {
        NotFoundError {
            target: target.to_string(),
            normalized_target: normalized.to_string(),
            available: available.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_sheet_not_matched_names_prefix_and_sheets() {
        let err = IntakeError::SheetNotMatched {
            path: PathBuf::from("/data/q1.xlsx"),
            error: not_found("Sheet Prefix", "sheetprefix", &["Summary", "Données 2024"]),
        };
        let message = err.to_string();
        assert!(message.contains("'Sheet Prefix'"));
        assert!(message.contains("'sheetprefix'"));
        assert!(message.contains("/data/q1.xlsx"));
        assert!(message.contains("[Summary, Données 2024]"));
    }

    #[test]
    fn test_column_not_matched_names_target_and_headers() {
        let err = IntakeError::ColumnNotMatched {
            sheet: "March".to_string(),
            error: not_found("column_b", "column_b", &["Column A Name", "Flag Marker1"]),
        };
        let message = err.to_string();
        assert!(message.contains("'column_b'"));
        assert!(message.contains("'March'"));
        assert!(message.contains("[Column A Name, Flag Marker1]"));
    }

    #[test]
    fn test_match_diagnostics_reported_once() {
        let err = anyhow::Error::from(IntakeError::SheetNotMatched {
            path: PathBuf::from("q1.xlsx"),
            error: not_found("Sheet Prefix", "sheetprefix", &["Summary"]),
        });
        assert_eq!(err.chain().count(), 1);

        let report = format!("{:?}", err);
        assert_eq!(report.matches("[Summary]").count(), 1);
    }
}
