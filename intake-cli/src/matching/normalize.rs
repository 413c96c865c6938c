//! Text canonicalization for fuzzy name comparison
//!
//! Two keys are produced from arbitrary text:
//! - [`normalize_key`]: accents folded, lower-cased, every whitespace character removed.
//!   This is the key all resolvers compare on.
//! - [`normalize_loose`]: accents folded, lower-cased, only literal spaces removed.
//!   Used by the flag heuristic's marker test and nowhere else.

use unicode_normalization::UnicodeNormalization;

/// Canonical comparison key for a sheet name or column header.
///
/// Absent or empty input yields an empty key. Distinct inputs may share a key
/// ("Column  A" and "column\ta" both become "columna").
pub fn normalize_key<'a>(text: impl Into<Option<&'a str>>) -> String {
    fold_ascii_lower(text.into())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Looser key for substring search: tabs and newlines survive, spaces do not.
pub fn normalize_loose<'a>(text: impl Into<Option<&'a str>>) -> String {
    fold_ascii_lower(text.into()).replace(' ', "")
}

/// NFKD-decompose, drop anything outside ASCII (combining marks included), lower-case.
fn fold_ascii_lower(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };

    text.nfkd()
        .filter(char::is_ascii)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
