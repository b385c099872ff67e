//! Search options carried through the database and search layers.

use crate::search::fuzzy::LevenshteinCost;
use serde::{Deserialize, Serialize};

/// Immutable configuration bundle for database loading and searching.
///
/// Built once by the caller and passed by reference into the core; the
/// only field the loader may rewrite on its own copy is `accessable`,
/// which is downgraded when a database file itself is unreadable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Fold ASCII case in both pattern and haystack before matching.
    pub ignore_case: bool,
    /// Remove the trailing extension of the final component before matching.
    pub strip_extension: bool,
    /// Require a candidate's final component to equal the pattern's,
    /// compared before baking.
    pub basename_must_match: bool,
    /// Reduce both pattern and candidates to their final component.
    pub strip_path: bool,
    /// Require candidates to exist on disk.
    pub existing: bool,
    /// Require read access to candidates.
    pub accessable: bool,
    /// Allow symlinks as candidates.
    pub symlink: bool,
    /// Build the basename index eagerly at construction.
    pub hash_map: bool,
    /// Edit costs for the fuzzy matcher.
    pub levenshtein_cost: LevenshteinCost,
    /// Maximum accepted distance for the fuzzy matcher.
    pub levenshtein_threshold: usize,
    /// Stop after this many results; 0 means unlimited.
    pub max_matches: usize,
    /// Worker fan-out for the sequential matchers.
    pub n_workers: usize,
    /// Restrict loaded paths to this prefix.
    pub root: String,
    /// Keep loading remaining databases when one of them cannot be read.
    pub skip_bad_databases: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignore_case: false,
            strip_extension: false,
            basename_must_match: false,
            strip_path: false,
            existing: false,
            accessable: false,
            symlink: false,
            hash_map: false,
            levenshtein_cost: LevenshteinCost::default(),
            levenshtein_threshold: 0,
            max_matches: 0,
            n_workers: 1,
            root: "/".to_string(),
            skip_bad_databases: false,
        }
    }
}

impl Options {
    /// Worker count with the zero value normalized away.
    pub fn workers(&self) -> usize {
        self.n_workers.max(1)
    }
}
