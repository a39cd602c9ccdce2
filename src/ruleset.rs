//! Rule registry for a single handler type.
//!
//! A [`RuleSet`] is immutable once built. Inheritance is by value: a child
//! builder starts from a copy of the parent's rules and default, then appends
//! its own declarations. Nothing a parent does afterwards reaches the child.

use crate::actions::Actions;
use crate::config::AccessConfig;
use crate::error::ConfigurationError;
use crate::rule::{AccessRule, RuleOptions};
use crate::types::Effect;

/// The ordered rules and default access of one handler type.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Option<Vec<AccessRule>>,
    default_access: Option<Effect>,
    config: AccessConfig,
}

impl RuleSet {
    /// Create a builder with no rules and no default.
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::new(RuleSet::default())
    }

    /// Create a builder that extends `parent`.
    pub fn inherit(parent: &RuleSet) -> RuleSetBuilder {
        RuleSetBuilder::new(parent.clone())
    }

    /// The rules in declaration order, ancestors first.
    ///
    /// `None` if no rule was ever declared in this chain, which is distinct
    /// from a declared but empty list.
    pub fn rules(&self) -> Option<&[AccessRule]> {
        self.rules.as_deref()
    }

    /// The declared default, or `None` if unset along the whole chain.
    pub fn default_access(&self) -> Option<Effect> {
        self.default_access
    }

    /// The settings this rule set evaluates with.
    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.as_ref().map_or(0, Vec::len)
    }

    /// Returns `true` if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builder for [`RuleSet`].
///
/// Declarations are recorded in order. The first invalid declaration is kept
/// and returned by [`RuleSetBuilder::build`]; later declarations are ignored.
#[derive(Debug)]
#[must_use]
pub struct RuleSetBuilder {
    set: RuleSet,
    error: Option<ConfigurationError>,
}

impl RuleSetBuilder {
    fn new(set: RuleSet) -> Self {
        RuleSetBuilder { set, error: None }
    }

    /// Declare a rule: `allow(actions, options)` or `deny(actions, options)`.
    pub fn declare(
        mut self,
        effect: Effect,
        actions: impl Into<Actions>,
        options: RuleOptions,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        match AccessRule::new(effect, actions, options) {
            Ok(rule) => self.push(rule),
            Err(e) => self.error = Some(e),
        }
        self
    }

    /// Declare an allow rule.
    pub fn allow(self, actions: impl Into<Actions>, options: RuleOptions) -> Self {
        self.declare(Effect::Allow, actions, options)
    }

    /// Declare a deny rule.
    pub fn deny(self, actions: impl Into<Actions>, options: RuleOptions) -> Self {
        self.declare(Effect::Deny, actions, options)
    }

    /// Set or override the default access.
    pub fn default_access(mut self, effect: Effect) -> Self {
        self.set.default_access = Some(effect);
        self
    }

    /// `allow_by_default`
    pub fn allow_by_default(self) -> Self {
        self.default_access(Effect::Allow)
    }

    /// `deny_by_default`
    pub fn deny_by_default(self) -> Self {
        self.default_access(Effect::Deny)
    }

    /// Replace the settings.
    pub fn config(mut self, config: AccessConfig) -> Self {
        self.set.config = config;
        self
    }

    fn push(&mut self, rule: AccessRule) {
        self.set.rules.get_or_insert_with(Vec::new).push(rule);
    }

    /// Validate limits and expression syntax, then finish.
    pub fn build(self) -> Result<RuleSet, ConfigurationError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let set = self.set;

        if set.len() > set.config.max_rules {
            return Err(ConfigurationError::TooManyRules {
                max: set.config.max_rules,
                actual: set.len(),
            });
        }

        let max_depth = set.config.condition_depth_limit();
        for rule in set.rules().unwrap_or_default() {
            let depth = rule.condition_depth();
            if depth > max_depth {
                return Err(ConfigurationError::ConditionTooDeep {
                    max: max_depth,
                    actual: depth,
                });
            }
            if let Some(compiled) = rule.invalid_expression() {
                if let Some(error) = compiled.error() {
                    return Err(ConfigurationError::InvalidExpression {
                        source_text: compiled.source().to_string(),
                        error: error.clone(),
                    });
                }
            }
        }

        tracing::debug!(
            rules = set.len(),
            default = ?set.default_access,
            "rule set built"
        );
        Ok(set)
    }
}
