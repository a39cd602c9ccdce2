//! Evaluation statistics.
//!
//! This module provides the `EvaluationStats` struct which records
//! what a single evaluation pass actually did.

/// Work done during one rule-set evaluation.
///
/// Filled in by `RuleSet::evaluate_with_stats()`. Useful for debugging rule
/// order and for checking that redundant rules are not evaluated.
///
/// The struct is `Copy` to allow cheap cloning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    /// Number of rules whose action scope matched the request.
    pub rules_matched: u16,

    /// Matching rules whose condition was not evaluated because their
    /// effect equalled the running verdict.
    pub rules_skipped: u16,

    /// Number of rules that set the running verdict.
    pub rules_applied: u16,

    /// Total number of condition nodes evaluated.
    ///
    /// Includes all All, Any, Not and leaf nodes visited.
    pub condition_evals: u16,

    /// Maximum condition depth reached.
    pub max_depth_reached: u8,
}

impl EvaluationStats {
    /// Create a new stats tracker initialized to zero.
    #[inline]
    pub const fn new() -> Self {
        EvaluationStats {
            rules_matched: 0,
            rules_skipped: 0,
            rules_applied: 0,
            condition_evals: 0,
            max_depth_reached: 0,
        }
    }

    /// Increment the matched rules counter.
    #[inline]
    pub fn inc_matched(&mut self) {
        self.rules_matched = self.rules_matched.saturating_add(1);
    }

    /// Increment the skipped rules counter.
    #[inline]
    pub fn inc_skipped(&mut self) {
        self.rules_skipped = self.rules_skipped.saturating_add(1);
    }

    /// Increment the applied rules counter.
    #[inline]
    pub fn inc_applied(&mut self) {
        self.rules_applied = self.rules_applied.saturating_add(1);
    }

    /// Update the max depth if current depth is higher.
    #[inline]
    pub fn update_depth(&mut self, depth: u8) {
        if depth > self.max_depth_reached {
            self.max_depth_reached = depth;
        }
    }

    /// Increment the condition evaluation counter.
    #[inline]
    pub fn inc_condition_evals(&mut self) {
        self.condition_evals = self.condition_evals.saturating_add(1);
    }
}
