//! Dialog engine settings.

use serde::Deserialize;

/// Settings for dialog execution.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DialogSettings {
    /// Maximum number of nested dialog dispatches (begin, continue and
    /// resume calls in flight) within one turn before the turn fails with
    /// an internal-loop error.
    #[serde(default = "default_max_dispatch_depth")]
    pub max_dispatch_depth: usize,
}

fn default_max_dispatch_depth() -> usize {
    64
}

impl Default for DialogSettings {
    fn default() -> Self {
        Self {
            max_dispatch_depth: default_max_dispatch_depth(),
        }
    }
}
