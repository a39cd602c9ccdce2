//! Per-request rule evaluation.
//!
//! Single pass over the rules in declaration order, no backtracking:
//!
//! 1. The running verdict starts at the declared default, or undetermined.
//! 2. Rules whose action scope does not cover the request are skipped.
//! 3. A matching rule's render/callback options are remembered, whether or
//!    not its condition passes. The most recent one wins.
//! 4. A matching rule's guard is lowered, so a malformed guard fails the
//!    check even when the rule could not change the verdict.
//! 5. A matching rule whose effect equals the running verdict cannot change
//!    anything; its condition is not evaluated.
//! 6. Otherwise the condition is evaluated (absent means true) and, if it
//!    holds, the rule's effect becomes the running verdict.
//!
//! An undetermined verdict after the pass allows.

use crate::context::AccessContext;
use crate::error::EvaluationError;
use crate::rule::{Callback, RenderTarget};
use crate::ruleset::RuleSet;
use crate::stats::EvaluationStats;
use crate::types::{DenyResponse, Effect, Verdict};

impl RuleSet {
    /// Evaluate this rule set for the request described by `ctx`.
    ///
    /// Returns `Err` if a condition cannot be evaluated. That is never
    /// turned into an allow or a deny.
    pub fn evaluate(&self, ctx: &dyn AccessContext) -> Result<Verdict, EvaluationError> {
        self.evaluate_with_stats(ctx).map(|(verdict, _)| verdict)
    }

    /// Like [`RuleSet::evaluate`], also reporting what the pass did.
    pub fn evaluate_with_stats(
        &self,
        ctx: &dyn AccessContext,
    ) -> Result<(Verdict, EvaluationStats), EvaluationError> {
        let action = ctx.action_name();
        let mut stats = EvaluationStats::new();
        let mut verdict: Option<Effect> = self.default_access();
        let mut render: Option<&RenderTarget> = None;
        let mut callback: Option<&Callback> = None;

        for (index, rule) in self.rules().unwrap_or_default().iter().enumerate() {
            if !rule.actions.matches(action) {
                continue;
            }
            stats.inc_matched();

            if rule.render.is_some() {
                render = rule.render.as_ref();
            }
            if rule.callback.is_some() {
                callback = rule.callback.as_ref();
            }

            let condition = rule.guard.as_ref().map(|guard| guard.condition()).transpose()?;

            if verdict == Some(rule.effect) {
                stats.inc_skipped();
                tracing::trace!(index, action, "rule cannot change verdict, condition skipped");
                continue;
            }

            let applies = match &condition {
                None => true,
                Some(condition) => condition.evaluate(ctx, &mut stats)?,
            };
            if applies {
                stats.inc_applied();
                tracing::debug!(index, action, effect = ?rule.effect, "rule applied");
                verdict = Some(rule.effect);
            }
        }

        let verdict = match verdict.unwrap_or(Effect::Allow) {
            Effect::Allow => Verdict::Allow,
            Effect::Deny => {
                let response = self.deny_response(render, callback);
                tracing::debug!(action, ?response, "access denied");
                Verdict::Deny(response)
            }
        };
        Ok((verdict, stats))
    }

    /// Render beats callback beats the default redirect.
    fn deny_response(
        &self,
        render: Option<&RenderTarget>,
        callback: Option<&Callback>,
    ) -> DenyResponse {
        let config = self.config();
        match (render, callback) {
            (Some(target), _) => {
                DenyResponse::Render(target.clone().with_default_status(config.render_status))
            }
            (None, Some(callback)) => DenyResponse::Callback(callback.clone()),
            (None, None) => DenyResponse::Redirect(config.deny_location.clone()),
        }
    }
}
