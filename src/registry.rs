//! Handler-type registry with rule inheritance.
//!
//! Each handler type owns a resolved [`RuleSet`] snapshot. Defining a child
//! copies the parent's snapshot and extends it; reopening a type replaces its
//! own snapshot only. Snapshots are shared behind `Arc` and never mutated, so
//! any number of requests may evaluate them concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::AccessConfig;
use crate::error::ConfigurationError;
use crate::filter::AccessFilter;
use crate::ruleset::{RuleSet, RuleSetBuilder};

#[derive(Debug, Clone)]
struct HandlerEntry {
    parent: Option<String>,
    rules: Arc<RuleSet>,
}

/// Rule sets for a family of handler types.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    config: AccessConfig,
    handlers: BTreeMap<String, HandlerEntry>,
}

impl HandlerRegistry {
    /// Create an empty registry with default settings.
    pub fn new() -> Self {
        HandlerRegistry::default()
    }

    /// Create an empty registry whose root handler types use `config`.
    pub fn with_config(config: AccessConfig) -> Self {
        HandlerRegistry {
            config,
            handlers: BTreeMap::new(),
        }
    }

    /// Define handler type `name`, optionally inheriting from `parent`.
    ///
    /// `declare` receives a builder pre-loaded with the parent's rules and
    /// default (or an empty one for a root type) and appends declarations.
    pub fn define<F>(
        &mut self,
        name: &str,
        parent: Option<&str>,
        declare: F,
    ) -> Result<Arc<RuleSet>, ConfigurationError>
    where
        F: FnOnce(RuleSetBuilder) -> RuleSetBuilder,
    {
        if self.handlers.contains_key(name) {
            return Err(ConfigurationError::DuplicateHandler(name.to_string()));
        }

        let builder = match parent {
            Some(parent_name) => {
                let entry = self
                    .handlers
                    .get(parent_name)
                    .ok_or_else(|| ConfigurationError::UnknownHandler(parent_name.to_string()))?;
                RuleSet::inherit(&entry.rules)
            }
            None => RuleSet::builder().config(self.config.clone()),
        };

        let rules = Arc::new(declare(builder).build()?);
        tracing::debug!(handler = name, parent, rules = rules.len(), "handler type defined");
        self.handlers.insert(
            name.to_string(),
            HandlerEntry {
                parent: parent.map(str::to_string),
                rules: Arc::clone(&rules),
            },
        );
        Ok(rules)
    }

    /// Append declarations to an already defined handler type.
    ///
    /// Only `name` gets the new snapshot. Types defined from it earlier keep
    /// the rules they were built with.
    pub fn reopen<F>(&mut self, name: &str, declare: F) -> Result<Arc<RuleSet>, ConfigurationError>
    where
        F: FnOnce(RuleSetBuilder) -> RuleSetBuilder,
    {
        let entry = self
            .handlers
            .get_mut(name)
            .ok_or_else(|| ConfigurationError::UnknownHandler(name.to_string()))?;
        let rules = Arc::new(declare(RuleSet::inherit(&entry.rules)).build()?);
        entry.rules = Arc::clone(&rules);
        tracing::debug!(handler = name, rules = rules.len(), "handler type reopened");
        Ok(rules)
    }

    /// The rule set of handler type `name`.
    pub fn get(&self, name: &str) -> Option<Arc<RuleSet>> {
        self.handlers.get(name).map(|entry| Arc::clone(&entry.rules))
    }

    /// The parent of handler type `name`.
    pub fn parent(&self, name: &str) -> Option<&str> {
        self.handlers.get(name)?.parent.as_deref()
    }

    /// A pre-handler filter for handler type `name`.
    pub fn filter(&self, name: &str) -> Option<AccessFilter> {
        self.get(name).map(AccessFilter::new)
    }

    /// Defined handler type names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Number of defined handler types.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler type is defined.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
