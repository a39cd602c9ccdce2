//! YAML rule file loader
//!
//! Reads rule files and compiles them into a [`HandlerRegistry`].

use std::path::{Path, PathBuf};

use actiongate::{
    Actions, Callback, ConditionValue, ConfigurationError, Effect, HandlerRegistry, OptionKey,
    RuleOptions, RuleSetBuilder,
};
use serde_yaml::Value;

use crate::ast::{HandlerDecl, RuleDecl, RuleFile};

/// Errors raised while loading a rule file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("handler `{handler}`, rule {rule}: {message}")]
    Format {
        handler: String,
        rule: usize,
        message: String,
    },

    #[error("handler `{handler}`: {source}")]
    Config {
        handler: String,
        #[source]
        source: ConfigurationError,
    },
}

/// Load a rule file from disk.
pub fn load_rule_file(path: &Path) -> Result<RuleFile, LoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rule_file(&contents)
}

/// Parse a rule file from a YAML string.
pub fn parse_rule_file(yaml: &str) -> Result<RuleFile, LoadError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Load and compile a rule file in one step.
pub fn load_registry(path: &Path) -> Result<HandlerRegistry, LoadError> {
    compile(&load_rule_file(path)?)
}

/// Compile a parsed rule file into a registry.
///
/// Handlers are defined in file order, so a parent must appear before its
/// children.
pub fn compile(file: &RuleFile) -> Result<HandlerRegistry, LoadError> {
    let mut registry = HandlerRegistry::with_config(file.settings.clone().unwrap_or_default());

    for handler in &file.handlers {
        let declarations = handler
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| declaration(handler, index, rule))
            .collect::<Result<Vec<_>, _>>()?;

        registry
            .define(&handler.name, handler.parent.as_deref(), |builder| {
                declare_all(builder, handler.default, declarations)
            })
            .map_err(|source| LoadError::Config {
                handler: handler.name.clone(),
                source,
            })?;
    }

    tracing::debug!(handlers = registry.len(), "rule file compiled");
    Ok(registry)
}

struct Declaration {
    effect: Effect,
    actions: Actions,
    options: RuleOptions,
}

fn declare_all(
    mut builder: RuleSetBuilder,
    default: Option<Effect>,
    declarations: Vec<Declaration>,
) -> RuleSetBuilder {
    if let Some(effect) = default {
        builder = builder.default_access(effect);
    }
    for decl in declarations {
        builder = builder.declare(decl.effect, decl.actions, decl.options);
    }
    builder
}

fn declaration(
    handler: &HandlerDecl,
    index: usize,
    rule: &RuleDecl,
) -> Result<Declaration, LoadError> {
    let (effect, list) = match (&rule.allow, &rule.deny) {
        (Some(list), None) => (Effect::Allow, list),
        (None, Some(list)) => (Effect::Deny, list),
        (allow, _) => {
            let message = if allow.is_some() {
                "rule has both `allow` and `deny`"
            } else {
                "rule needs `allow` or `deny`"
            };
            return Err(LoadError::Format {
                handler: handler.name.clone(),
                rule: index,
                message: message.to_string(),
            });
        }
    };

    let options = rule_options(rule).map_err(|source| LoadError::Config {
        handler: handler.name.clone(),
        source,
    })?;
    Ok(Declaration {
        effect,
        actions: Actions::one_of(list.clone().into_vec()),
        options,
    })
}

fn rule_options(rule: &RuleDecl) -> Result<RuleOptions, ConfigurationError> {
    let mut options = RuleOptions::new();
    if let Some(target) = &rule.render {
        options = options.render(target.clone());
    }
    if let Some(name) = &rule.callback {
        options = options.callback(Callback::named(name.as_str()));
    }
    for (key, value) in &rule.options {
        let key = match key {
            Value::String(key) => key.parse::<OptionKey>()?,
            other => return Err(ConfigurationError::UnknownOption(yaml_text(other))),
        };
        match key {
            OptionKey::Guard(kind) => options = options.guard(kind, condition_value(value)),
            // Deserialized into their own fields.
            OptionKey::Render | OptionKey::Callback => {}
        }
    }
    Ok(options)
}

/// Map a YAML guard value onto a condition value.
///
/// Strings name predicates, `{expr: "..."}` holds an expression and
/// sequences become lists. Anything else is kept as unsupported so the
/// guard reports a type error when evaluated.
pub fn condition_value(value: &Value) -> ConditionValue {
    match value {
        Value::String(name) => ConditionValue::predicate(name.as_str()),
        Value::Sequence(items) => ConditionValue::List(items.iter().map(condition_value).collect()),
        Value::Mapping(map) if map.len() == 1 => match map.get("expr") {
            Some(Value::String(source)) => ConditionValue::expr(source.as_str()),
            _ => unsupported(value),
        },
        Value::Tagged(tagged) => condition_value(&tagged.value),
        _ => unsupported(value),
    }
}

fn unsupported(value: &Value) -> ConditionValue {
    ConditionValue::Unsupported(yaml_text(value))
}

fn yaml_text(value: &Value) -> String {
    let text = serde_yaml::to_string(value).unwrap_or_default();
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actiongate::{DenyResponse, FixedContext, GuardKind, RenderTarget, Verdict};
    use pretty_assertions::assert_eq;

    const CONTROLLERS: &str = r#"
settings:
  deny_location: /login
handlers:
  - name: Application
    default: deny
    rules:
      - allow: [index, show]
  - name: Admin
    parent: Application
    rules:
      - allow: ~
        if: admin?
      - deny: destroy
        unless: { expr: "owner? && admin?" }
        render: { template: denied, status: 403 }
"#;

    fn verdict(registry: &HandlerRegistry, handler: &str, ctx: &FixedContext) -> Verdict {
        registry.get(handler).unwrap().evaluate(ctx).unwrap()
    }

    #[test]
    fn test_parse_minimal() {
        let file = parse_rule_file("handlers: []").unwrap();
        assert!(file.settings.is_none());
        assert!(file.handlers.is_empty());
    }

    #[test]
    fn test_parse_controllers() {
        let file = parse_rule_file(CONTROLLERS).unwrap();
        assert_eq!(file.settings.as_ref().unwrap().deny_location, "/login");
        assert_eq!(file.handlers.len(), 2);

        let admin = file.handler("Admin").unwrap();
        assert_eq!(admin.parent.as_deref(), Some("Application"));
        assert!(admin.rules[0].allow.as_ref().unwrap().clone().into_vec().is_empty());
        assert_eq!(
            admin.rules[1].render,
            Some(RenderTarget::new("denied").with_status(403))
        );
        assert_eq!(
            admin.rules[1].options.keys().collect::<Vec<_>>(),
            vec![&Value::from("unless")]
        );
    }

    #[test]
    fn test_compile_and_evaluate() {
        let registry = compile(&parse_rule_file(CONTROLLERS).unwrap()).unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Admin", "Application"]);

        let guest = FixedContext::new("edit").with_predicate("admin?", false);
        assert!(verdict(&registry, "Application", &FixedContext::new("show")).is_allow());
        assert!(matches!(
            verdict(&registry, "Admin", &guest),
            Verdict::Deny(DenyResponse::Redirect(location)) if location == "/login"
        ));

        let admin = FixedContext::new("edit").with_predicate("admin?", true);
        assert!(verdict(&registry, "Admin", &admin).is_allow());

        let destroy = FixedContext::new("destroy")
            .with_predicate("admin?", true)
            .with_predicate("owner?", false);
        match verdict(&registry, "Admin", &destroy) {
            Verdict::Deny(DenyResponse::Render(target)) => {
                assert_eq!(target, RenderTarget::new("denied").with_status(403));
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn test_condition_values() {
        let value: Value =
            serde_yaml::from_str("[first?, [second?, third?], {expr: 'a? or b?'}]").unwrap();
        assert_eq!(
            format!("{:?}", condition_value(&value)),
            format!(
                "{:?}",
                ConditionValue::List(vec![
                    ConditionValue::predicate("first?"),
                    ConditionValue::list(["second?", "third?"]),
                    ConditionValue::expr("a? or b?"),
                ])
            )
        );
        assert_eq!(
            format!("{:?}", condition_value(&Value::from(42))),
            "Unsupported(42)"
        );
    }

    #[test]
    fn test_unsupported_guard_fails_at_evaluation() {
        let registry = compile(
            &parse_rule_file(
                r#"
handlers:
  - name: Base
    rules:
      - deny: []
        if: 42
"#,
            )
            .unwrap(),
        )
        .unwrap();
        let err = registry
            .get("Base")
            .unwrap()
            .evaluate(&FixedContext::new("first"))
            .unwrap_err();
        assert!(matches!(
            err,
            actiongate::EvaluationError::ConditionType { guard, ref value }
                if guard == GuardKind::If.key() && value == "Unsupported(42)"
        ));
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let file = parse_rule_file(
            r#"
handlers:
  - name: Base
    rules:
      - allow: [first]
        when: first?
"#,
        )
        .unwrap();
        match compile(&file).unwrap_err() {
            LoadError::Config { handler, source } => {
                assert_eq!(handler, "Base");
                assert_eq!(source, ConfigurationError::UnknownOption("when".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_multiple_conditions_are_rejected() {
        let file = parse_rule_file(
            r#"
handlers:
  - name: Base
    rules:
      - allow: [first]
        if: first?
        unless: second?
"#,
        )
        .unwrap();
        match compile(&file).unwrap_err() {
            LoadError::Config { source, .. } => assert_eq!(
                source,
                ConfigurationError::MultipleConditions {
                    count: 2,
                    keys: vec!["if", "unless"],
                }
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_guard_keys_keep_file_order() {
        let file = parse_rule_file(
            r#"
handlers:
  - name: Base
    rules:
      - deny: [first]
        unless_any: [second?]
        if: first?
        when: third?
"#,
        )
        .unwrap();
        let keys: Vec<_> = file.handlers[0].rules[0]
            .options
            .keys()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(keys, vec!["unless_any", "if", "when"]);

        match compile(&file).unwrap_err() {
            LoadError::Config { source, .. } => {
                assert_eq!(source, ConfigurationError::UnknownOption("when".into()));
            }
            other => panic!("unexpected error: {other}"),
        }

        let file = parse_rule_file(
            r#"
handlers:
  - name: Base
    rules:
      - deny: [first]
        unless_any: [a?]
        if: b?
"#,
        )
        .unwrap();
        assert!(matches!(
            compile(&file).unwrap_err(),
            LoadError::Config {
                source: ConfigurationError::MultipleConditions { ref keys, .. },
                ..
            } if keys == &["unless_any", "if"]
        ));
    }

    #[test]
    fn test_expression_syntax_fails_at_compile() {
        let file = parse_rule_file(
            r#"
handlers:
  - name: Base
    rules:
      - deny: []
        if: { expr: "first? ||" }
"#,
        )
        .unwrap();
        match compile(&file).unwrap_err() {
            LoadError::Config { handler, source } => {
                assert_eq!(handler, "Base");
                assert!(matches!(
                    source,
                    ConfigurationError::InvalidExpression { ref source_text, .. }
                        if source_text == "first? ||"
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rule_needs_exactly_one_effect() {
        let both = parse_rule_file(
            "handlers:\n  - name: Base\n    rules:\n      - allow: [a]\n        deny: [b]\n",
        )
        .unwrap();
        let neither = parse_rule_file(
            "handlers:\n  - name: Base\n    rules:\n      - if: first?\n",
        )
        .unwrap();
        for file in [both, neither] {
            assert!(matches!(
                compile(&file).unwrap_err(),
                LoadError::Format { rule: 0, .. }
            ));
        }
    }

    #[test]
    fn test_parent_must_come_first() {
        let file = parse_rule_file(
            "handlers:\n  - name: Child\n    parent: Base\n  - name: Base\n",
        )
        .unwrap();
        assert!(matches!(
            compile(&file).unwrap_err(),
            LoadError::Config {
                source: ConfigurationError::UnknownHandler(_),
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_settings_key_is_a_parse_error() {
        let err = parse_rule_file("settings:\n  deny_path: /\nhandlers: []\n").unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_registry(Path::new("/nonexistent/rules.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().starts_with("cannot read /nonexistent/rules.yaml"));
    }
}
