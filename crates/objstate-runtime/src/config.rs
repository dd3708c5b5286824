//! Store configuration.

use serde::{Deserialize, Serialize};

/// Default cap on simultaneously active mutations: none, so finite
/// re-entrant chains of any depth run to completion.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = usize::MAX;

/// Configuration for a `Store`.
///
/// Deserializes from partial input; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name attached to every log record the store emits.
    pub name: Option<String>,
    /// Maximum number of mutations that may be active at once through
    /// listener re-entry (the outermost mutation counts as one). Values below
    /// 1 are treated as 1.
    pub max_nesting_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: None,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl StoreConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name used in log records.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the nesting limit (clamped to at least 1).
    #[must_use]
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth.max(1);
        self
    }

    /// No practical nesting limit. Same as the default.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            name: None,
            max_nesting_depth: usize::MAX,
        }
    }

    /// Effective nesting limit after clamping.
    pub(crate) fn nesting_limit(&self) -> usize {
        self.max_nesting_depth.max(1)
    }
}
