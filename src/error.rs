//! Error types.
//!
//! Two families, split by when they can happen:
//! - [`ConfigurationError`] is raised while rule sets are declared. It never
//!   reaches request time.
//! - [`EvaluationError`] is raised while a request is evaluated. It is a
//!   request-processing failure, never a silent allow or deny.

use thiserror::Error;

use crate::expr::ExpressionError;

/// Boxed error produced by host-supplied code (predicates, callables,
/// callbacks, responders).
pub type HostError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while declaring rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// An option key outside the recognized set.
    #[error(
        "unknown rule option `{0}` (valid options: render, callback, if, if_all, if_any, \
         unless, unless_all, unless_any)"
    )]
    UnknownOption(String),

    /// More than one condition guard on a single rule.
    #[error("there can be only one condition, got {count}: {}", keys.join(", "))]
    MultipleConditions {
        /// Number of guards supplied.
        count: usize,
        /// The guard keys, in declaration order.
        keys: Vec<&'static str>,
    },

    /// Condition nesting exceeds the configured limit.
    #[error("condition too deep: max {max}, got {actual}")]
    ConditionTooDeep {
        /// Configured maximum.
        max: usize,
        /// Actual depth of the declared condition.
        actual: usize,
    },

    /// Rule count exceeds the configured limit.
    #[error("too many rules: max {max}, got {actual}")]
    TooManyRules {
        /// Configured maximum.
        max: usize,
        /// Actual number of rules, inherited ones included.
        actual: usize,
    },

    /// An expression condition that does not parse.
    #[error("invalid expression `{source_text}`: {error}")]
    InvalidExpression {
        /// The expression text as declared.
        source_text: String,
        /// The syntax error.
        error: ExpressionError,
    },

    /// A handler type names a parent that was never defined.
    #[error("unknown handler type `{0}`")]
    UnknownHandler(String),

    /// A handler type was defined twice.
    #[error("handler type `{0}` is already defined")]
    DuplicateHandler(String),
}

/// Errors raised while evaluating a request.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// A condition value has a shape the guard cannot interpret.
    #[error("unknown type of condition for `{guard}`: {value}")]
    ConditionType {
        /// The guard key carrying the value.
        guard: &'static str,
        /// Rendering of the offending value.
        value: String,
    },

    /// A named predicate is not known to the handler context.
    #[error("undefined predicate `{0}`")]
    UnknownPredicate(String),

    /// A named predicate failed.
    #[error("predicate `{name}` failed: {source}")]
    Predicate {
        /// The predicate name.
        name: String,
        /// The host error.
        #[source]
        source: HostError,
    },

    /// A callable condition failed.
    #[error("condition callable failed: {0}")]
    Callable(#[source] HostError),

    /// An expression condition could not be parsed or evaluated.
    #[error("expression condition `{source_text}` failed: {error}")]
    Expression {
        /// The expression text.
        source_text: String,
        /// What went wrong.
        #[source]
        error: Box<ExpressionError>,
    },

    /// The deny response could not be produced.
    #[error("deny response failed: {0}")]
    Response(#[source] HostError),
}

impl EvaluationError {
    /// Wrap a host error raised by a named predicate.
    pub fn predicate(name: impl Into<String>, source: impl Into<HostError>) -> Self {
        EvaluationError::Predicate {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Wrap an expression failure.
    pub fn expression(source_text: impl Into<String>, error: ExpressionError) -> Self {
        EvaluationError::Expression {
            source_text: source_text.into(),
            error: Box::new(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_conditions_message() {
        let err = ConfigurationError::MultipleConditions {
            count: 2,
            keys: vec!["if", "unless"],
        };
        assert_eq!(
            err.to_string(),
            "there can be only one condition, got 2: if, unless"
        );
    }

    #[test]
    fn test_condition_type_message_names_value() {
        let err = EvaluationError::ConditionType {
            guard: "if_all",
            value: "Predicate(first?)".to_string(),
        };
        assert!(err.to_string().contains("Predicate(first?)"));
        assert!(err.to_string().contains("if_all"));
    }

    #[test]
    fn test_predicate_error_keeps_source() {
        let err = EvaluationError::predicate("admin?", "session expired");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("session expired"));
    }
}
