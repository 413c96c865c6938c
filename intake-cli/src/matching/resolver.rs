//! Normalized-prefix resolution of target labels against candidate names
//!
//! A candidate matches a target when the candidate's normalized key starts with the
//! target's normalized key. Candidates are always scanned in source order, so the
//! first match wins and ties never depend on hashing.

use super::normalize::normalize_key;

/// No candidate's key starts with the target's key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundError {
    /// Target prefix as written in configuration
    pub target: String,
    /// Target prefix after normalization
    pub normalized_target: String,
    /// Every candidate name that was tried, original casing, source order
    pub available: Vec<String>,
}

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "nothing starts with '{}' (normalized: '{}'); available: [{}]",
            self.target,
            self.normalized_target,
            self.available
                .iter()
                .map(|name| format!("'{}'", name))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for NotFoundError {}

/// Resolve a single target to the first candidate whose key starts with it
pub fn resolve_one<'c, S: AsRef<str>>(
    target: &str,
    candidates: &'c [S],
) -> Result<&'c str, NotFoundError> {
    let normalized_target = normalize_key(target);

    candidates
        .iter()
        .map(|candidate| candidate.as_ref())
        .find(|candidate: &&str| normalize_key(*candidate).starts_with(&normalized_target))
        .ok_or_else(|| NotFoundError {
            target: target.to_string(),
            normalized_target,
            available: candidates.iter().map(|c| c.as_ref().to_string()).collect(),
        })
}

/// Resolve several targets at once
///
/// Each target contributes at most its first matching candidate; a candidate already
/// taken by an earlier target is skipped. Output follows target order. An empty result
/// is not an error, callers check for the targets they require.
pub fn resolve_many<'c, T: AsRef<str>, S: AsRef<str>>(
    targets: &[T],
    candidates: &'c [S],
) -> Vec<&'c str> {
    let keys: Vec<String> = candidates
        .iter()
        .map(|c| normalize_key(c.as_ref()))
        .collect();

    let mut selected: Vec<&'c str> = Vec::new();
    for target in targets {
        let normalized_target = normalize_key(target.as_ref());

        let hit = candidates
            .iter()
            .zip(&keys)
            .map(|(candidate, key)| (candidate.as_ref(), key))
            .find(|(candidate, key)| {
                key.starts_with(&normalized_target) && !selected.contains(candidate)
            });

        if let Some((candidate, _)) = hit {
            selected.push(candidate);
        }
    }

    if selected.is_empty() {
        log::warn!(
            "No candidates selected for targets {:?} from {:?}",
            targets.iter().map(|t| t.as_ref()).collect::<Vec<&str>>(),
            candidates.iter().map(|c| c.as_ref()).collect::<Vec<&str>>()
        );
    }

    selected
}
