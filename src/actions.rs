//! Action scoping for rules.
//!
//! A rule either applies to every action or to a fixed set of action names.
//! Only two shapes: Any and OneOf. No patterns.

use std::fmt;

/// The set of actions a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Actions {
    /// Applies to every action (a global rule).
    #[default]
    Any,
    /// Applies to the listed actions only. Never empty.
    OneOf(Vec<String>),
}

impl Actions {
    /// Scope matching every action.
    pub fn any() -> Self {
        Actions::Any
    }

    /// Scope matching the given actions. An empty list matches every action.
    pub fn one_of<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for action in actions {
            let action = action.into();
            if !names.contains(&action) {
                names.push(action);
            }
        }
        if names.is_empty() {
            Actions::Any
        } else {
            Actions::OneOf(names)
        }
    }

    /// Returns `true` if this scope applies to every action.
    pub fn is_global(&self) -> bool {
        matches!(self, Actions::Any)
    }

    /// Check if this scope covers `action`.
    pub fn matches(&self, action: &str) -> bool {
        match self {
            Actions::Any => true,
            Actions::OneOf(names) => names.iter().any(|name| name == action),
        }
    }
}

impl fmt::Display for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actions::Any => f.write_str("*"),
            Actions::OneOf(names) => f.write_str(&names.join(", ")),
        }
    }
}

impl From<&str> for Actions {
    fn from(action: &str) -> Self {
        Actions::one_of([action])
    }
}

impl From<String> for Actions {
    fn from(action: String) -> Self {
        Actions::one_of([action])
    }
}

impl<const N: usize> From<[&str; N]> for Actions {
    fn from(actions: [&str; N]) -> Self {
        Actions::one_of(actions)
    }
}

impl From<&[&str]> for Actions {
    fn from(actions: &[&str]) -> Self {
        Actions::one_of(actions.iter().copied())
    }
}

impl From<Vec<String>> for Actions {
    fn from(actions: Vec<String>) -> Self {
        Actions::one_of(actions)
    }
}
