//! Core type definitions for verdicts and decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rule::{Callback, RenderTarget};

/// The effect of a rule or a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Access is allowed.
    Allow,
    /// Access is denied.
    Deny,
}

impl Effect {
    /// Returns `true` if this effect is `Allow`.
    #[inline]
    pub fn is_allow(&self) -> bool {
        matches!(self, Effect::Allow)
    }

    /// Returns `true` if this effect is `Deny`.
    #[inline]
    pub fn is_deny(&self) -> bool {
        matches!(self, Effect::Deny)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Allow => f.write_str("allow"),
            Effect::Deny => f.write_str("deny"),
        }
    }
}

impl From<bool> for Effect {
    fn from(allowed: bool) -> Self {
        if allowed {
            Effect::Allow
        } else {
            Effect::Deny
        }
    }
}

/// How a denial should be answered.
#[derive(Debug, Clone)]
pub enum DenyResponse {
    /// Render this target. Its status is already resolved.
    Render(RenderTarget),
    /// Hand the response over to this callback.
    Callback(Callback),
    /// Run the default deny action: redirect to this location.
    Redirect(String),
}

/// Outcome of evaluating a rule set for one request.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// The handler may run.
    Allow,
    /// The handler must not run; answer with the given response.
    Deny(DenyResponse),
}

impl Verdict {
    /// The effect of this verdict.
    pub fn effect(&self) -> Effect {
        match self {
            Verdict::Allow => Effect::Allow,
            Verdict::Deny(_) => Effect::Deny,
        }
    }

    /// Returns `true` if this verdict allows access.
    #[inline]
    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    /// Returns `true` if this verdict denies access.
    #[inline]
    pub fn is_deny(&self) -> bool {
        !self.is_allow()
    }
}

/// Result of the pre-handler access check, as seen by the dispatch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// The final effect.
    pub effect: Effect,
    /// Whether a deny response was already written. Always `false` on allow.
    pub response_written: bool,
}

impl Decision {
    /// An allow decision.
    #[inline]
    pub const fn allow() -> Self {
        Decision {
            effect: Effect::Allow,
            response_written: false,
        }
    }

    /// A deny decision.
    #[inline]
    pub const fn deny(response_written: bool) -> Self {
        Decision {
            effect: Effect::Deny,
            response_written,
        }
    }

    /// Returns `true` if the handler may run.
    #[inline]
    pub fn is_allow(&self) -> bool {
        self.effect.is_allow()
    }

    /// Returns `true` if the handler must be skipped.
    #[inline]
    pub fn is_deny(&self) -> bool {
        self.effect.is_deny()
    }
}
