//! YAML rule files for Actiongate.
//!
//! A rule file declares handler types, their parents, defaults and ordered
//! allow/deny rules. [`loader::compile`] turns it into a
//! [`actiongate::HandlerRegistry`].
//!
//! ```rust
//! use actiongate::FixedContext;
//! use actiongate_yaml::loader::{compile, parse_rule_file};
//!
//! let file = parse_rule_file(
//!     "handlers:\n  - name: Posts\n    default: deny\n    rules:\n      - allow: [index]\n",
//! )
//! .unwrap();
//! let registry = compile(&file).unwrap();
//! let rules = registry.get("Posts").unwrap();
//! assert!(rules.evaluate(&FixedContext::new("index")).unwrap().is_allow());
//! assert!(rules.evaluate(&FixedContext::new("edit")).unwrap().is_deny());
//! ```

pub mod ast;
pub mod loader;
pub mod report;

pub use loader::{compile, load_registry, load_rule_file, parse_rule_file, LoadError};
