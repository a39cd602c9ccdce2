//! The pre-handler access check.
//!
//! The host dispatch chain calls [`AccessFilter::check`] before running the
//! matched handler and skips the handler when the decision is deny.

use std::sync::Arc;

use crate::context::AccessContext;
use crate::error::{EvaluationError, HostError};
use crate::rule::{Callback, RenderTarget};
use crate::ruleset::RuleSet;
use crate::types::{Decision, DenyResponse, Verdict};

/// Host operations used to answer a denied request.
pub trait DenyResponder {
    /// The default deny action: redirect to `location`.
    fn redirect(&mut self, location: &str) -> Result<(), HostError>;

    /// Render `target`. Its status is already resolved.
    fn render(&mut self, target: &RenderTarget) -> Result<(), HostError>;

    /// Run the named callback. Returns whether it wrote a response.
    fn run_callback(&mut self, name: &str) -> Result<bool, HostError>;
}

/// Evaluates a handler type's rule set and drives the deny response.
#[derive(Debug, Clone)]
pub struct AccessFilter {
    rules: Arc<RuleSet>,
}

impl AccessFilter {
    /// Create a filter over `rules`.
    pub fn new(rules: Arc<RuleSet>) -> Self {
        AccessFilter { rules }
    }

    /// The rule set this filter evaluates.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Evaluate access for the current request.
    ///
    /// On allow nothing else happens. On deny the response is produced
    /// through `responder` (or the callable callback) before returning.
    pub fn check(
        &self,
        ctx: &dyn AccessContext,
        responder: &mut dyn DenyResponder,
    ) -> Result<Decision, EvaluationError> {
        let response = match self.rules.evaluate(ctx)? {
            Verdict::Allow => return Ok(Decision::allow()),
            Verdict::Deny(response) => response,
        };

        let written = match &response {
            DenyResponse::Render(target) => {
                responder.render(target).map_err(EvaluationError::Response)?;
                true
            }
            DenyResponse::Callback(Callback::Named(name)) => responder
                .run_callback(name)
                .map_err(EvaluationError::Response)?,
            DenyResponse::Callback(Callback::Callable(f)) => {
                f(ctx).map_err(EvaluationError::Response)?
            }
            DenyResponse::Redirect(location) => {
                responder.redirect(location).map_err(EvaluationError::Response)?;
                true
            }
        };

        tracing::info!(
            action = ctx.action_name(),
            response_written = written,
            "request denied"
        );
        Ok(Decision::deny(written))
    }
}
