//! Evaluator configuration.

use serde::{Deserialize, Serialize};

/// Hard upper bound on condition nesting, regardless of configuration.
pub const ABSOLUTE_MAX_CONDITION_DEPTH: usize = 32;

/// Settings shared by a rule set and its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    /// Where the default deny action redirects to.
    pub deny_location: String,
    /// Status supplied to render targets that carry none.
    pub render_status: u16,
    /// Maximum number of rules in a rule set, inherited rules included.
    pub max_rules: usize,
    /// Maximum condition nesting depth. Clamped to
    /// [`ABSOLUTE_MAX_CONDITION_DEPTH`].
    pub max_condition_depth: usize,
}

impl AccessConfig {
    /// The effective depth limit.
    pub fn condition_depth_limit(&self) -> usize {
        self.max_condition_depth.min(ABSOLUTE_MAX_CONDITION_DEPTH)
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        AccessConfig {
            deny_location: "/".to_string(),
            render_status: 401,
            max_rules: 1000,
            max_condition_depth: 8,
        }
    }
}
