//! Human and JSON renderings of verdicts and registries.

use actiongate::{Callback, DenyResponse, EvaluationStats, HandlerRegistry, Verdict};
use serde_json::{json, Value};

/// One-line description of a verdict.
pub fn describe(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Allow => "allow".to_string(),
        Verdict::Deny(DenyResponse::Redirect(location)) => format!("deny: redirect to {location}"),
        Verdict::Deny(DenyResponse::Render(target)) => match target.status {
            Some(status) => format!("deny: render {} ({status})", target.template),
            None => format!("deny: render {}", target.template),
        },
        Verdict::Deny(DenyResponse::Callback(callback)) => {
            format!("deny: callback {}", callback_name(callback))
        }
    }
}

fn callback_name(callback: &Callback) -> &str {
    match callback {
        Callback::Named(name) => name,
        Callback::Callable(_) => "<callable>",
    }
}

/// JSON form of a verdict, optionally with evaluation statistics.
pub fn verdict_json(verdict: &Verdict, stats: Option<&EvaluationStats>) -> Value {
    let mut out = match verdict {
        Verdict::Allow => json!({ "effect": "allow" }),
        Verdict::Deny(DenyResponse::Redirect(location)) => {
            json!({ "effect": "deny", "redirect": location })
        }
        Verdict::Deny(DenyResponse::Render(target)) => {
            json!({ "effect": "deny", "render": target })
        }
        Verdict::Deny(DenyResponse::Callback(callback)) => {
            json!({ "effect": "deny", "callback": callback_name(callback) })
        }
    };
    if let Some(stats) = stats {
        out["stats"] = json!({
            "rules_matched": stats.rules_matched,
            "rules_skipped": stats.rules_skipped,
            "rules_applied": stats.rules_applied,
            "condition_evals": stats.condition_evals,
            "max_depth_reached": stats.max_depth_reached,
        });
    }
    out
}

/// Describe every handler type in `registry`, one line each.
pub fn list_handlers(registry: &HandlerRegistry) -> Vec<String> {
    registry
        .names()
        .filter_map(|name| {
            let rules = registry.get(name)?;
            let parent = registry
                .parent(name)
                .map(|p| format!(" < {p}"))
                .unwrap_or_default();
            let default = rules
                .default_access()
                .map(|effect| format!(", default {effect}"))
                .unwrap_or_default();
            Some(format!("{name}{parent}: {} rules{default}", rules.len()))
        })
        .collect()
}
