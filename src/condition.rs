//! Condition guards and condition trees.
//!
//! A rule carries at most one [`Guard`]: a guard key (`if`, `if_all`, ...)
//! plus the [`ConditionValue`] supplied for it. At evaluation time the guard
//! is lowered to a [`Condition`] tree and evaluated against the context.
//!
//! List convention: a bare list under `if`/`unless` is any-of; every list
//! nested inside another list is all-of.
//!
//! Depth and expression syntax are checked when the rule set is built.
//! Evaluation is stack-based (non-recursive) and short-circuits.

use std::fmt;
use std::sync::Arc;

use crate::context::AccessContext;
use crate::error::{EvaluationError, HostError};
use crate::expr::CompiledExpression;
use crate::stats::EvaluationStats;

/// Signature of a callable condition.
pub type ConditionFn = dyn Fn(&dyn AccessContext) -> Result<bool, HostError> + Send + Sync;

/// A value supplied to a condition guard.
#[derive(Clone)]
pub enum ConditionValue {
    /// A named predicate, resolved through [`AccessContext::predicate`].
    Predicate(String),
    /// Expression text, parsed on construction and resolved through
    /// [`AccessContext::evaluate_expression`].
    Expression(Arc<CompiledExpression>),
    /// A boolean function over the context.
    Callable(Arc<ConditionFn>),
    /// A list of conditions.
    List(Vec<ConditionValue>),
    /// A value of a type no guard accepts, kept for error reporting.
    ///
    /// Produced by loaders reading untyped sources (numbers, booleans, maps).
    Unsupported(String),
}

impl ConditionValue {
    /// A named predicate.
    pub fn predicate(name: impl Into<String>) -> Self {
        ConditionValue::Predicate(name.into())
    }

    /// An expression in the embedded expression language.
    ///
    /// The text is parsed here. A syntax error surfaces as
    /// [`ConfigurationError::InvalidExpression`](crate::ConfigurationError::InvalidExpression)
    /// when the rule set is built.
    pub fn expr(source: impl Into<String>) -> Self {
        ConditionValue::Expression(Arc::new(CompiledExpression::new(source)))
    }

    /// An infallible callable.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&dyn AccessContext) -> bool + Send + Sync + 'static,
    {
        ConditionValue::try_callable(move |ctx| Ok(f(ctx)))
    }

    /// A callable that may fail. Failures propagate to the caller of the
    /// evaluation.
    pub fn try_callable<F>(f: F) -> Self
    where
        F: Fn(&dyn AccessContext) -> Result<bool, HostError> + Send + Sync + 'static,
    {
        ConditionValue::Callable(Arc::new(f))
    }

    /// A list of conditions.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ConditionValue>,
    {
        ConditionValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if this is a `List` variant.
    pub fn is_list(&self) -> bool {
        matches!(self, ConditionValue::List(_))
    }

    /// Nesting depth of this value. Leaves and empty lists have depth 1.
    ///
    /// Non-recursive, so unvalidated values of any depth are safe to measure.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((value, depth)) = stack.pop() {
            max = max.max(depth);
            if let ConditionValue::List(items) = value {
                stack.extend(items.iter().map(|item| (item, depth.saturating_add(1))));
            }
        }
        max
    }

    /// The first expression, in declaration order, whose text did not parse.
    pub fn invalid_expression(&self) -> Option<&CompiledExpression> {
        let mut stack = vec![self];
        while let Some(value) = stack.pop() {
            match value {
                ConditionValue::Expression(compiled) if compiled.error().is_some() => {
                    return Some(compiled.as_ref());
                }
                ConditionValue::List(items) => stack.extend(items.iter().rev()),
                _ => {}
            }
        }
        None
    }
}

impl fmt::Debug for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Predicate(name) => write!(f, "Predicate({name})"),
            ConditionValue::Expression(compiled) => {
                write!(f, "Expression({:?})", compiled.source())
            }
            ConditionValue::Callable(_) => write!(f, "Callable"),
            ConditionValue::List(items) => f.debug_list().entries(items).finish(),
            ConditionValue::Unsupported(repr) => write!(f, "Unsupported({repr})"),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(name: &str) -> Self {
        ConditionValue::Predicate(name.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(name: String) -> Self {
        ConditionValue::Predicate(name)
    }
}

impl<T: Into<ConditionValue>> From<Vec<T>> for ConditionValue {
    fn from(items: Vec<T>) -> Self {
        ConditionValue::list(items)
    }
}

impl<T: Into<ConditionValue>, const N: usize> From<[T; N]> for ConditionValue {
    fn from(items: [T; N]) -> Self {
        ConditionValue::list(items)
    }
}

/// The six condition guard keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardKind {
    /// `if: X`
    If,
    /// `if_all: [X, ...]`
    IfAll,
    /// `if_any: [X, ...]`
    IfAny,
    /// `unless: X`
    Unless,
    /// `unless_all: [X, ...]`
    UnlessAll,
    /// `unless_any: [X, ...]`
    UnlessAny,
}

impl GuardKind {
    /// All guard kinds, in key order.
    pub const ALL: [GuardKind; 6] = [
        GuardKind::If,
        GuardKind::IfAll,
        GuardKind::IfAny,
        GuardKind::Unless,
        GuardKind::UnlessAll,
        GuardKind::UnlessAny,
    ];

    /// The option key for this guard.
    pub const fn key(&self) -> &'static str {
        match self {
            GuardKind::If => "if",
            GuardKind::IfAll => "if_all",
            GuardKind::IfAny => "if_any",
            GuardKind::Unless => "unless",
            GuardKind::UnlessAll => "unless_all",
            GuardKind::UnlessAny => "unless_any",
        }
    }

    /// Returns `true` for the `unless` family.
    pub const fn is_negated(&self) -> bool {
        matches!(
            self,
            GuardKind::Unless | GuardKind::UnlessAll | GuardKind::UnlessAny
        )
    }

    /// Look up a guard by option key.
    pub fn from_key(key: &str) -> Option<GuardKind> {
        GuardKind::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A guard key paired with its value.
#[derive(Debug, Clone)]
pub struct Guard {
    /// Which guard.
    pub kind: GuardKind,
    /// The supplied value.
    pub value: ConditionValue,
}

impl Guard {
    /// Create a guard.
    pub fn new(kind: GuardKind, value: impl Into<ConditionValue>) -> Self {
        Guard {
            kind,
            value: value.into(),
        }
    }

    /// Lower this guard to a condition tree.
    ///
    /// Fails with [`EvaluationError::ConditionType`] when the value has a
    /// shape the guard cannot interpret: a non-list for the `_all`/`_any`
    /// guards, or an unsupported value anywhere.
    pub fn condition(&self) -> Result<Condition<'_>, EvaluationError> {
        let guard = self.kind.key();
        let positive = match self.kind {
            GuardKind::If | GuardKind::Unless => lower(&self.value, Conjunction::Any, guard)?,
            GuardKind::IfAll | GuardKind::UnlessAll => {
                lower_list(&self.value, Conjunction::All, guard)?
            }
            GuardKind::IfAny | GuardKind::UnlessAny => {
                lower_list(&self.value, Conjunction::Any, guard)?
            }
        };
        if self.kind.is_negated() {
            Ok(Condition::Not(Box::new(positive)))
        } else {
            Ok(positive)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    All,
    Any,
}

fn lower_list<'a>(
    value: &'a ConditionValue,
    conjunction: Conjunction,
    guard: &'static str,
) -> Result<Condition<'a>, EvaluationError> {
    if !value.is_list() {
        return Err(EvaluationError::ConditionType {
            guard,
            value: format!("{value:?}"),
        });
    }
    lower(value, conjunction, guard)
}

/// `conjunction` applies if `value` is a list; nested lists are all-of.
fn lower<'a>(
    value: &'a ConditionValue,
    conjunction: Conjunction,
    guard: &'static str,
) -> Result<Condition<'a>, EvaluationError> {
    match value {
        ConditionValue::Predicate(name) => Ok(Condition::Predicate(name)),
        ConditionValue::Expression(compiled) => Ok(Condition::Expression(compiled.as_ref())),
        ConditionValue::Callable(f) => Ok(Condition::Callable(f.as_ref())),
        ConditionValue::List(items) => {
            let children = items
                .iter()
                .map(|item| lower(item, Conjunction::All, guard))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(match conjunction {
                Conjunction::All => Condition::All(children),
                Conjunction::Any => Condition::Any(children),
            })
        }
        ConditionValue::Unsupported(_) => Err(EvaluationError::ConditionType {
            guard,
            value: format!("{value:?}"),
        }),
    }
}

/// A lowered condition tree, borrowing from the guard it came from.
pub enum Condition<'a> {
    /// A named predicate.
    Predicate(&'a str),
    /// An expression.
    Expression(&'a CompiledExpression),
    /// A callable.
    Callable(&'a ConditionFn),
    /// True iff every child is true. Empty is true.
    All(Vec<Condition<'a>>),
    /// True iff some child is true. Empty is false.
    Any(Vec<Condition<'a>>),
    /// Negation.
    Not(Box<Condition<'a>>),
}

impl fmt::Debug for Condition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Predicate(name) => write!(f, "Predicate({name})"),
            Condition::Expression(compiled) => write!(f, "Expression({:?})", compiled.source()),
            Condition::Callable(_) => write!(f, "Callable"),
            Condition::All(items) => f.debug_tuple("All").field(items).finish(),
            Condition::Any(items) => f.debug_tuple("Any").field(items).finish(),
            Condition::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
        }
    }
}

impl<'a> Condition<'a> {
    /// Evaluate this condition against the given context.
    ///
    /// Children of `All`/`Any` are evaluated left to right and evaluation
    /// stops at the first child that decides the result. Host errors from
    /// predicates, expressions and callables propagate unchanged.
    pub fn evaluate(
        &self,
        ctx: &dyn AccessContext,
        stats: &mut EvaluationStats,
    ) -> Result<bool, EvaluationError> {
        enum Frame<'c, 'a> {
            Eval(&'c Condition<'a>, usize),
            All(std::slice::Iter<'c, Condition<'a>>, usize),
            Any(std::slice::Iter<'c, Condition<'a>>, usize),
            Not,
        }

        let mut stack: Vec<Frame<'_, 'a>> = Vec::with_capacity(16);
        stack.push(Frame::Eval(self, 1));
        // Value of the most recently completed sub-condition.
        let mut last = false;

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Eval(cond, depth) => {
                    stats.inc_condition_evals();
                    stats.update_depth(u8::try_from(depth).unwrap_or(u8::MAX));
                    match cond {
                        Condition::Predicate(name) => last = ctx.predicate(name)?,
                        Condition::Expression(compiled) => {
                            last = ctx.evaluate_expression(compiled.expression()?)?
                        }
                        Condition::Callable(f) => {
                            last = f(ctx).map_err(EvaluationError::Callable)?
                        }
                        Condition::All(items) => {
                            last = true;
                            stack.push(Frame::All(items.iter(), depth));
                        }
                        Condition::Any(items) => {
                            last = false;
                            stack.push(Frame::Any(items.iter(), depth));
                        }
                        Condition::Not(inner) => {
                            stack.push(Frame::Not);
                            stack.push(Frame::Eval(inner, depth + 1));
                        }
                    }
                }
                Frame::All(mut rest, depth) => {
                    if last {
                        if let Some(next) = rest.next() {
                            stack.push(Frame::All(rest, depth));
                            stack.push(Frame::Eval(next, depth + 1));
                        }
                    }
                }
                Frame::Any(mut rest, depth) => {
                    if !last {
                        if let Some(next) = rest.next() {
                            stack.push(Frame::Any(rest, depth));
                            stack.push(Frame::Eval(next, depth + 1));
                        }
                    }
                }
                Frame::Not => last = !last,
            }
        }

        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FixedContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx(action: &str) -> FixedContext {
        FixedContext::new(action)
            .with_predicate("yes?", true)
            .with_predicate("no?", false)
    }

    fn eval(guard: Guard) -> Result<bool, EvaluationError> {
        let mut stats = EvaluationStats::new();
        guard.condition()?.evaluate(&ctx("first"), &mut stats)
    }

    #[test]
    fn test_single_values() {
        assert!(eval(Guard::new(GuardKind::If, "yes?")).unwrap());
        assert!(!eval(Guard::new(GuardKind::If, "no?")).unwrap());
        assert!(!eval(Guard::new(GuardKind::Unless, "yes?")).unwrap());
        assert!(eval(Guard::new(GuardKind::If, ConditionValue::expr("no? || yes?"))).unwrap());
        assert!(eval(Guard::new(
            GuardKind::If,
            ConditionValue::callable(|c| c.action_name() == "first")
        ))
        .unwrap());
    }

    #[test]
    fn test_all_and_any() {
        assert!(eval(Guard::new(GuardKind::IfAll, ["yes?", "yes?"])).unwrap());
        assert!(!eval(Guard::new(GuardKind::IfAll, ["yes?", "no?"])).unwrap());
        assert!(eval(Guard::new(GuardKind::IfAny, ["no?", "yes?"])).unwrap());
        assert!(!eval(Guard::new(GuardKind::IfAny, ["no?", "no?"])).unwrap());
        assert!(eval(Guard::new(GuardKind::UnlessAll, ["yes?", "no?"])).unwrap());
        assert!(!eval(Guard::new(GuardKind::UnlessAny, ["no?", "yes?"])).unwrap());
    }

    #[test]
    fn test_empty_lists_are_vacuous() {
        let empty = || ConditionValue::List(Vec::new());
        assert!(eval(Guard::new(GuardKind::IfAll, empty())).unwrap());
        assert!(!eval(Guard::new(GuardKind::UnlessAll, empty())).unwrap());
        assert!(!eval(Guard::new(GuardKind::IfAny, empty())).unwrap());
        assert!(eval(Guard::new(GuardKind::UnlessAny, empty())).unwrap());
    }

    #[test]
    fn test_bare_list_under_if_is_any_nested_is_all() {
        assert!(eval(Guard::new(GuardKind::If, ["no?", "yes?"])).unwrap());
        // [[no?, yes?]] is any-of one all-of pair.
        let nested = ConditionValue::list([ConditionValue::list(["no?", "yes?"])]);
        assert!(!eval(Guard::new(GuardKind::If, nested.clone())).unwrap());
        // Nested lists are all-of under if_any too.
        assert!(!eval(Guard::new(GuardKind::IfAny, nested)).unwrap());
    }

    #[test]
    fn test_list_guards_reject_non_lists() {
        for kind in [
            GuardKind::IfAll,
            GuardKind::IfAny,
            GuardKind::UnlessAll,
            GuardKind::UnlessAny,
        ] {
            let err = eval(Guard::new(kind, "yes?")).unwrap_err();
            assert!(matches!(
                err,
                EvaluationError::ConditionType { guard, ref value }
                    if guard == kind.key() && value == "Predicate(yes?)"
            ));
        }
    }

    #[test]
    fn test_unsupported_value_is_type_error() {
        let value =
            ConditionValue::list(["yes?".into(), ConditionValue::Unsupported("42".into())]);
        assert!(matches!(
            eval(Guard::new(GuardKind::If, value)),
            Err(EvaluationError::ConditionType { guard: "if", ref value })
                if value == "Unsupported(42)"
        ));
    }

    #[test]
    fn test_invalid_expression_lookup() {
        assert!(ConditionValue::expr("yes? && no?").invalid_expression().is_none());
        let value = ConditionValue::list([
            ConditionValue::expr("yes?"),
            ConditionValue::list([ConditionValue::expr("(yes?")]),
            ConditionValue::expr("yes? ||"),
        ]);
        assert_eq!(value.invalid_expression().map(|e| e.source()), Some("(yes?"));

        // Unvalidated guards still report the syntax error when evaluated.
        assert!(matches!(
            eval(Guard::new(GuardKind::If, ConditionValue::expr("yes? ||"))),
            Err(EvaluationError::Expression { ref source_text, .. }) if source_text == "yes? ||"
        ));
    }

    #[test]
    fn test_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let counted = ConditionValue::callable(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        let first_yes = vec!["yes?".into(), counted.clone()];
        let first_no = vec!["no?".into(), counted.clone()];
        assert!(eval(Guard::new(GuardKind::IfAny, first_yes)).unwrap());
        assert!(!eval(Guard::new(GuardKind::IfAll, first_no)).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(eval(Guard::new(GuardKind::IfAll, vec!["yes?".into(), counted])).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callable_error_propagates() {
        let failing = ConditionValue::try_callable(|_| Err("boom".into()));
        assert!(matches!(
            eval(Guard::new(GuardKind::If, failing)),
            Err(EvaluationError::Callable(_))
        ));
    }

    #[test]
    fn test_depth() {
        assert_eq!(ConditionValue::from("a?").depth(), 1);
        assert_eq!(ConditionValue::List(Vec::new()).depth(), 1);
        assert_eq!(ConditionValue::list(["a?", "b?"]).depth(), 2);
        let nested = ConditionValue::list([ConditionValue::list([ConditionValue::list(["a?"])])]);
        assert_eq!(nested.depth(), 4);
    }

    #[test]
    fn test_stats_track_depth_and_nodes() {
        let mut stats = EvaluationStats::new();
        let guard = Guard::new(GuardKind::UnlessAll, ["yes?", "yes?"]);
        let result = guard.condition().unwrap().evaluate(&ctx("first"), &mut stats).unwrap();
        assert!(!result);
        // Not, All, yes?, yes?
        assert_eq!(stats.condition_evals, 4);
        assert_eq!(stats.max_depth_reached, 3);
    }

    #[test]
    fn test_guard_keys() {
        for kind in GuardKind::ALL {
            assert_eq!(GuardKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(GuardKind::from_key("when"), None);
        assert!(GuardKind::UnlessAny.is_negated());
        assert!(!GuardKind::IfAny.is_negated());
    }
}
