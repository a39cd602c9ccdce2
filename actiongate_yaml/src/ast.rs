//! Rule file AST types
//!
//! These types mirror the YAML rule file. They are plain data; turning them
//! into rule sets is the loader's job.

use actiongate::{AccessConfig, Effect, RenderTarget, VALID_RULE_OPTIONS};
use arbitrary::{Arbitrary, Unstructured};
use serde::{Deserialize, Deserializer, Serialize};

/// Root of a rule file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    /// Settings for every root handler type in the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<AccessConfig>,
    /// Handler types, parents before children.
    #[serde(default)]
    pub handlers: Vec<HandlerDecl>,
}

/// One handler type.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Effect>,
    #[serde(default)]
    pub rules: Vec<RuleDecl>,
}

/// Actions named by `allow:` or `deny:`. Empty means every action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ActionList {
    One(String),
    Many(Vec<String>),
}

impl ActionList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ActionList::One(action) => vec![action],
            ActionList::Many(actions) => actions,
        }
    }
}

// `allow: ~` is present-but-empty, not absent.
fn present<'de, D>(deserializer: D) -> Result<Option<ActionList>, D::Error>
where
    D: Deserializer<'de>,
{
    let list = Option::<ActionList>::deserialize(deserializer)?;
    Ok(Some(list.unwrap_or(ActionList::Many(Vec::new()))))
}

/// One `allow`/`deny` declaration.
///
/// Condition guards and any unrecognised keys land in `options`, in file
/// order; the loader validates them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleDecl {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub allow: Option<ActionList>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub deny: Option<ActionList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<String>,
    #[serde(flatten)]
    pub options: serde_yaml::Mapping,
}

const ACTION_POOL: [&str; 5] = ["index", "show", "edit", "update", "destroy"];
const PREDICATE_POOL: [&str; 4] = ["first?", "second?", "admin?", "owner?"];
const EXPR_POOL: [&str; 4] = [
    "first? && second?",
    "!admin?",
    "owner? or (admin? and not first?)",
    "first? ||",
];

fn arbitrary_condition(
    u: &mut Unstructured<'_>,
    depth: u8,
) -> arbitrary::Result<serde_yaml::Value> {
    use serde_yaml::Value;

    Ok(match u.int_in_range(0..=9)? {
        0..=3 => Value::String(u.choose(&PREDICATE_POOL)?.to_string()),
        4 | 5 => {
            let mut map = serde_yaml::Mapping::new();
            map.insert(
                Value::String("expr".into()),
                Value::String(u.choose(&EXPR_POOL)?.to_string()),
            );
            Value::Mapping(map)
        }
        6 | 7 if depth < 4 => {
            let len = u.int_in_range(0..=3)?;
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(arbitrary_condition(u, depth + 1)?);
            }
            Value::Sequence(items)
        }
        // Values no guard accepts.
        8 => Value::Number(u.int_in_range(0..=100u64)?.into()),
        _ => Value::Bool(bool::arbitrary(u)?),
    })
}

impl<'a> Arbitrary<'a> for RuleDecl {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let mut actions = Vec::new();
        for action in ACTION_POOL {
            if u.ratio(1, 4)? {
                actions.push(action.to_string());
            }
        }
        let actions = Some(ActionList::Many(actions));

        let mut rule = RuleDecl::default();
        if bool::arbitrary(u)? {
            rule.allow = actions;
        } else {
            rule.deny = actions;
        }

        if u.ratio(1, 5)? {
            let status = if bool::arbitrary(u)? { Some(403) } else { None };
            rule.render = Some(RenderTarget {
                template: "denied".into(),
                status,
            });
        }
        if u.ratio(1, 5)? {
            rule.callback = Some("notify_admin".into());
        }

        // Mostly zero or one guard; occasionally two, or an unknown key.
        let guards = match u.int_in_range(0..=9)? {
            0..=3 => 0,
            4..=8 => 1,
            _ => 2,
        };
        for _ in 0..guards {
            let key = if u.ratio(1, 20)? {
                "when".to_string()
            } else {
                u.choose(&VALID_RULE_OPTIONS[2..])?.to_string()
            };
            let value = arbitrary_condition(u, 0)?;
            rule.options.insert(serde_yaml::Value::String(key), value);
        }

        Ok(rule)
    }
}

impl<'a> Arbitrary<'a> for HandlerDecl {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let default = match u.int_in_range(0..=2)? {
            0 => None,
            1 => Some(Effect::Allow),
            _ => Some(Effect::Deny),
        };
        let len = u.int_in_range(0..=6)?;
        let mut rules = Vec::with_capacity(len);
        for _ in 0..len {
            rules.push(RuleDecl::arbitrary(u)?);
        }
        Ok(HandlerDecl {
            name: String::new(),
            parent: None,
            default,
            rules,
        })
    }
}

impl<'a> Arbitrary<'a> for RuleFile {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let settings = if u.ratio(1, 3)? {
            Some(AccessConfig {
                deny_location: "/login".into(),
                render_status: 403,
                ..AccessConfig::default()
            })
        } else {
            None
        };

        // Each handler may inherit from any earlier one.
        let count = u.int_in_range(1..=4)?;
        let mut handlers: Vec<HandlerDecl> = Vec::with_capacity(count);
        for index in 0..count {
            let mut handler = HandlerDecl::arbitrary(u)?;
            handler.name = format!("Handler{index}");
            if index > 0 && bool::arbitrary(u)? {
                let parent = u.int_in_range(0..=index - 1)?;
                handler.parent = Some(handlers[parent].name.clone());
            }
            handlers.push(handler);
        }

        Ok(RuleFile { settings, handlers })
    }
}

impl RuleFile {
    /// Look up a handler declaration by name.
    pub fn handler(&self, name: &str) -> Option<&HandlerDecl> {
        self.handlers.iter().find(|h| h.name == name)
    }
}
