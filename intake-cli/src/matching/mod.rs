//! Resilient name resolution for human-authored sheet names and column headers
//!
//! Everything here compares normalized keys rather than raw text, so labels that differ
//! only in accents, casing, or whitespace resolve to the same target.

pub mod flag;
pub mod normalize;
pub mod resolver;

pub use flag::{FlagRule, find_flag_column};
pub use normalize::{normalize_key, normalize_loose};
pub use resolver::{NotFoundError, resolve_many, resolve_one};
