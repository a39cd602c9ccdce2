//! Access rules and their options.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::actions::Actions;
use crate::condition::{ConditionValue, Guard, GuardKind};
use crate::context::AccessContext;
use crate::error::{ConfigurationError, HostError};
use crate::expr::CompiledExpression;
use crate::types::Effect;

/// Every option key a rule declaration accepts.
pub const VALID_RULE_OPTIONS: [&str; 8] = [
    "render",
    "callback",
    "if",
    "if_all",
    "if_any",
    "unless",
    "unless_all",
    "unless_any",
];

/// A parsed option key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    /// `render`
    Render,
    /// `callback`
    Callback,
    /// One of the six condition guards.
    Guard(GuardKind),
}

impl FromStr for OptionKey {
    type Err = ConfigurationError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key {
            "render" => Ok(OptionKey::Render),
            "callback" => Ok(OptionKey::Callback),
            other => GuardKind::from_key(other)
                .map(OptionKey::Guard)
                .ok_or_else(|| ConfigurationError::UnknownOption(other.to_string())),
        }
    }
}

/// What to render when a request is denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTarget {
    /// Template or view name understood by the host renderer.
    pub template: String,
    /// Explicit response status. When absent the configured deny status applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl RenderTarget {
    /// Render `template` with no explicit status.
    pub fn new(template: impl Into<String>) -> Self {
        RenderTarget {
            template: template.into(),
            status: None,
        }
    }

    /// Set an explicit status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Supply `status` unless one is already set.
    pub fn with_default_status(mut self, status: u16) -> Self {
        self.status.get_or_insert(status);
        self
    }
}

/// Signature of a callable deny callback. Returns whether it wrote a response.
pub type CallbackFn = dyn Fn(&dyn AccessContext) -> Result<bool, HostError> + Send + Sync;

/// A deny callback.
#[derive(Clone)]
pub enum Callback {
    /// A named host operation, run through the host's responder.
    Named(String),
    /// A function over the context.
    Callable(Arc<CallbackFn>),
}

impl Callback {
    /// A named callback.
    pub fn named(name: impl Into<String>) -> Self {
        Callback::Named(name.into())
    }

    /// A callable callback.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&dyn AccessContext) -> Result<bool, HostError> + Send + Sync + 'static,
    {
        Callback::Callable(Arc::new(f))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Named(name) => write!(f, "Named({name})"),
            Callback::Callable(_) => write!(f, "Callable"),
        }
    }
}

impl From<&str> for Callback {
    fn from(name: &str) -> Self {
        Callback::named(name)
    }
}

/// Options for a rule declaration.
///
/// Guards are collected as given and checked when the rule is declared, so a
/// declaration with two guards fails with
/// [`ConfigurationError::MultipleConditions`] instead of silently keeping one.
#[derive(Debug, Clone, Default)]
pub struct RuleOptions {
    render: Option<RenderTarget>,
    callback: Option<Callback>,
    guards: Vec<Guard>,
}

impl RuleOptions {
    /// No options.
    pub fn new() -> Self {
        RuleOptions::default()
    }

    /// `render:` what to render on denial.
    pub fn render(mut self, target: RenderTarget) -> Self {
        self.render = Some(target);
        self
    }

    /// `callback:` what to run on denial.
    pub fn callback(mut self, callback: impl Into<Callback>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    /// Add a guard by kind.
    pub fn guard(mut self, kind: GuardKind, value: impl Into<ConditionValue>) -> Self {
        self.guards.push(Guard::new(kind, value));
        self
    }

    /// `if:` apply the rule when `value` holds.
    pub fn when(self, value: impl Into<ConditionValue>) -> Self {
        self.guard(GuardKind::If, value)
    }

    /// `if_all:` apply the rule when every listed condition holds.
    pub fn when_all(self, value: impl Into<ConditionValue>) -> Self {
        self.guard(GuardKind::IfAll, value)
    }

    /// `if_any:` apply the rule when some listed condition holds.
    pub fn when_any(self, value: impl Into<ConditionValue>) -> Self {
        self.guard(GuardKind::IfAny, value)
    }

    /// `unless:` apply the rule when `value` does not hold.
    pub fn unless(self, value: impl Into<ConditionValue>) -> Self {
        self.guard(GuardKind::Unless, value)
    }

    /// `unless_all:`
    pub fn unless_all(self, value: impl Into<ConditionValue>) -> Self {
        self.guard(GuardKind::UnlessAll, value)
    }

    /// `unless_any:`
    pub fn unless_any(self, value: impl Into<ConditionValue>) -> Self {
        self.guard(GuardKind::UnlessAny, value)
    }
}

/// A single allow/deny rule.
#[derive(Debug, Clone)]
pub struct AccessRule {
    /// Allow or deny.
    pub effect: Effect,
    /// Actions the rule applies to.
    pub actions: Actions,
    /// Optional condition guard. Absent means the rule always applies
    /// within its action scope.
    pub guard: Option<Guard>,
    /// Render target for denials.
    pub render: Option<RenderTarget>,
    /// Callback for denials.
    pub callback: Option<Callback>,
}

impl AccessRule {
    /// Build a rule from a declaration.
    pub fn new(
        effect: Effect,
        actions: impl Into<Actions>,
        options: RuleOptions,
    ) -> Result<Self, ConfigurationError> {
        let RuleOptions {
            render,
            callback,
            mut guards,
        } = options;

        if guards.len() > 1 {
            return Err(ConfigurationError::MultipleConditions {
                count: guards.len(),
                keys: guards.iter().map(|g| g.kind.key()).collect(),
            });
        }

        Ok(AccessRule {
            effect,
            actions: actions.into(),
            guard: guards.pop(),
            render,
            callback,
        })
    }

    /// Returns `true` if the rule allows.
    pub fn is_allow(&self) -> bool {
        self.effect.is_allow()
    }

    /// Nesting depth of the guard value, or 0 without a guard.
    pub fn condition_depth(&self) -> usize {
        self.guard.as_ref().map_or(0, |g| g.value.depth())
    }

    /// The first guard expression whose text did not parse.
    pub fn invalid_expression(&self) -> Option<&CompiledExpression> {
        self.guard.as_ref().and_then(|g| g.value.invalid_expression())
    }
}
