//! # Actiongate
//!
//! A small, deterministic, per-action access-control evaluator for request
//! handlers.
//!
//! A handler type declares ordered allow/deny rules, each optionally scoped
//! to actions and guarded by a condition, plus an optional default. Every
//! request is checked by replaying the rules in declaration order: the last
//! rule that applies decides.
//!
//! ## Design Principles
//!
//! - **Ordered**: later declarations win. Ancestor rules come first, so a
//!   subtype's own rules override inherited ones.
//! - **Immutable**: rule sets are built once and shared read-only.
//! - **Loud**: a condition that cannot be evaluated is an error, never a
//!   silent allow or deny.
//! - **Safe expressions**: expression conditions use a tiny boolean language
//!   over named predicates, not host code.
//!
//! ## Example
//!
//! ```rust
//! use actiongate::{Actions, FixedContext, RuleOptions, RuleSet};
//!
//! let rules = RuleSet::builder()
//!     .deny(Actions::any(), RuleOptions::new())
//!     .allow(["index", "show"], RuleOptions::new())
//!     .allow(Actions::any(), RuleOptions::new().when("admin?"))
//!     .build()
//!     .unwrap();
//!
//! let guest = FixedContext::new("edit").with_predicate("admin?", false);
//! assert!(rules.evaluate(&guest).unwrap().is_deny());
//!
//! let admin = FixedContext::new("edit").with_predicate("admin?", true);
//! assert!(rules.evaluate(&admin).unwrap().is_allow());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod actions;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod filter;
pub mod registry;
pub mod rule;
pub mod ruleset;
pub mod stats;
pub mod types;

pub use actions::Actions;
pub use condition::{Condition, ConditionValue, Guard, GuardKind};
pub use config::{AccessConfig, ABSOLUTE_MAX_CONDITION_DEPTH};
pub use context::{AccessContext, FixedContext, PredicateTable};
pub use error::{ConfigurationError, EvaluationError, HostError};
pub use expr::{CompiledExpression, Expression, ExpressionError};
pub use filter::{AccessFilter, DenyResponder};
pub use registry::HandlerRegistry;
pub use rule::{AccessRule, Callback, OptionKey, RenderTarget, RuleOptions, VALID_RULE_OPTIONS};
pub use ruleset::{RuleSet, RuleSetBuilder};
pub use stats::EvaluationStats;
pub use types::{Decision, DenyResponse, Effect, Verdict};
