//! Heuristic lookup of the optional flag column
//!
//! A header qualifies when its full key starts with the flag prefix and its loose key
//! contains one of the marker words. Only the first qualifying header is ever used.

use serde::Deserialize;

use super::normalize::{normalize_key, normalize_loose};

/// Prefix and marker words that identify the flag column
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlagRule {
    pub prefix: String,
    pub markers: Vec<String>,
}

impl Default for FlagRule {
    fn default() -> Self {
        Self {
            prefix: "flag".to_string(),
            markers: vec!["marker1".to_string(), "marker2".to_string()],
        }
    }
}

impl FlagRule {
    /// First header matching the rule, in source order
    ///
    /// Absence is a normal outcome. The prefix test uses the whitespace-free key, the
    /// marker test uses the loose key where tabs and newlines still separate words.
    /// Markers that normalize to nothing are ignored rather than matching every header.
    pub fn find_flag_column<'h, S: AsRef<str>>(&self, headers: &'h [S]) -> Option<&'h str> {
        let prefix = normalize_key(self.prefix.as_str());
        let markers: Vec<String> = self
            .markers
            .iter()
            .map(|m| normalize_loose(m.as_str()))
            .filter(|m| !m.is_empty())
            .collect();

        let found = headers.iter().map(|h| h.as_ref()).find(|header: &&str| {
            if !normalize_key(*header).starts_with(&prefix) {
                return false;
            }
            let loose = normalize_loose(*header);
            markers.iter().any(|marker| loose.contains(marker.as_str()))
        });

        match found {
            Some(header) => log::debug!("Flag column resolved to '{}'", header),
            None => log::debug!(
                "No flag column among {} headers (prefix '{}', markers {:?})",
                headers.len(),
                self.prefix,
                self.markers
            ),
        }

        found
    }
}

/// [`FlagRule::find_flag_column`] with the default rule
pub fn find_flag_column<S: AsRef<str>>(headers: &[S]) -> Option<&str> {
    FlagRule::default().find_flag_column(headers)
}
