//! Handler context seen by conditions.
//!
//! The evaluator never inspects a request itself. Everything it needs comes
//! through [`AccessContext`]: the current action name, named predicates, and
//! expression evaluation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{EvaluationError, HostError};
use crate::expr::Expression;

/// The request/handler context a rule set is evaluated against.
pub trait AccessContext {
    /// Name of the action the current request targets.
    fn action_name(&self) -> &str;

    /// Invoke the named boolean predicate.
    ///
    /// Unknown names must fail with [`EvaluationError::UnknownPredicate`];
    /// an access check that cannot be evaluated is never a silent verdict.
    fn predicate(&self, name: &str) -> Result<bool, EvaluationError>;

    /// Evaluate an expression condition.
    ///
    /// The expression arrives parsed. The default resolves identifiers
    /// through [`AccessContext::predicate`].
    fn evaluate_expression(&self, expression: &Expression) -> Result<bool, EvaluationError> {
        expression.evaluate(&mut |name| self.predicate(name))
    }
}

type PredicateFn<C> = dyn Fn(&C) -> Result<bool, HostError> + Send + Sync;

/// Lookup table from predicate name to a boolean function over a context.
///
/// Hosts typically keep one table per handler type and forward
/// [`AccessContext::predicate`] to [`PredicateTable::call`].
pub struct PredicateTable<C: ?Sized> {
    entries: HashMap<String, Arc<PredicateFn<C>>>,
}

impl<C: ?Sized> PredicateTable<C> {
    /// Create an empty table.
    pub fn new() -> Self {
        PredicateTable {
            entries: HashMap::new(),
        }
    }

    /// Register an infallible predicate.
    pub fn register<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.register_fallible(name, move |ctx| Ok(f(ctx)))
    }

    /// Register a predicate that may fail.
    pub fn register_fallible<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&C) -> Result<bool, HostError> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(f));
        self
    }

    /// Returns `true` if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Invoke the predicate `name` on `ctx`.
    pub fn call(&self, name: &str, ctx: &C) -> Result<bool, EvaluationError> {
        let f = self
            .entries
            .get(name)
            .ok_or_else(|| EvaluationError::UnknownPredicate(name.to_string()))?;
        f(ctx).map_err(|source| EvaluationError::predicate(name, source))
    }
}

impl<C: ?Sized> Default for PredicateTable<C> {
    fn default() -> Self {
        PredicateTable::new()
    }
}

impl<C: ?Sized> Clone for PredicateTable<C> {
    fn clone(&self) -> Self {
        PredicateTable {
            entries: self.entries.clone(),
        }
    }
}

impl<C: ?Sized> fmt::Debug for PredicateTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PredicateTable").field("names", &names).finish()
    }
}

/// A context whose predicates are fixed truth values.
///
/// Useful for dry runs: answer "what would this rule set decide for action
/// `x` if `admin?` were true".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedContext {
    action: String,
    predicates: HashMap<String, bool>,
}

impl FixedContext {
    /// Create a context for `action` with no predicates.
    pub fn new(action: impl Into<String>) -> Self {
        FixedContext {
            action: action.into(),
            predicates: HashMap::new(),
        }
    }

    /// Set the value of predicate `name`.
    pub fn with_predicate(mut self, name: impl Into<String>, value: bool) -> Self {
        self.predicates.insert(name.into(), value);
        self
    }
}

impl AccessContext for FixedContext {
    fn action_name(&self) -> &str {
        &self.action
    }

    fn predicate(&self, name: &str) -> Result<bool, EvaluationError> {
        self.predicates
            .get(name)
            .copied()
            .ok_or_else(|| EvaluationError::UnknownPredicate(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Controller {
        action: &'static str,
        predicates: PredicateTable<Controller>,
    }

    impl AccessContext for Controller {
        fn action_name(&self) -> &str {
            self.action
        }

        fn predicate(&self, name: &str) -> Result<bool, EvaluationError> {
            self.predicates.call(name, self)
        }
    }

    fn table() -> PredicateTable<Controller> {
        PredicateTable::new()
            .register("first?", |c: &Controller| c.action == "first")
            .register("second?", |c: &Controller| c.action == "second")
            .register_fallible("broken?", |_: &Controller| Err("database unavailable".into()))
    }

    #[test]
    fn test_predicate_table_lookup() {
        let c = Controller {
            action: "first",
            predicates: table(),
        };
        assert!(c.predicate("first?").unwrap());
        assert!(!c.predicate("second?").unwrap());
        assert!(c.predicates.contains("broken?"));
        assert!(!c.predicates.contains("third?"));
    }

    #[test]
    fn test_unknown_predicate_is_an_error() {
        let c = Controller {
            action: "first",
            predicates: table(),
        };
        assert!(matches!(
            c.predicate("third?"),
            Err(EvaluationError::UnknownPredicate(name)) if name == "third?"
        ));
    }

    #[test]
    fn test_failing_predicate_propagates() {
        let c = Controller {
            action: "first",
            predicates: table(),
        };
        assert!(matches!(
            c.predicate("broken?"),
            Err(EvaluationError::Predicate { ref name, .. }) if name == "broken?"
        ));
    }

    #[test]
    fn test_default_expression_evaluation() {
        let c = Controller {
            action: "second",
            predicates: table(),
        };
        let either = Expression::parse("first? || second?").unwrap();
        let both = Expression::parse("first? && second?").unwrap();
        assert!(c.evaluate_expression(&either).unwrap());
        assert!(!c.evaluate_expression(&both).unwrap());
    }

    #[test]
    fn test_fixed_context() {
        let ctx = FixedContext::new("index").with_predicate("admin?", true);
        assert_eq!(ctx.action_name(), "index");
        assert!(ctx.predicate("admin?").unwrap());
        assert!(ctx.predicate("guest?").is_err());
        let expression = Expression::parse("admin? && !false").unwrap();
        assert!(ctx.evaluate_expression(&expression).unwrap());
    }
}
