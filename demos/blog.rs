//! Illustrative scenario: a blog with posts and an admin area.
//!
//! 1. Everything is denied unless a rule allows it.
//! 2. Anyone may read posts; signed-in users may write them.
//! 3. Owners and admins may edit; destroying a locked post needs an admin.
//! 4. The admin area denies suspended admins through a callback.

use std::sync::Arc;

use actiongate::{
    AccessContext, AccessFilter, Actions, ConditionValue, DenyResponder, EvaluationError,
    HandlerRegistry, HostError, PredicateTable, RenderTarget, RuleOptions,
};

#[derive(Clone)]
struct User {
    name: &'static str,
    admin: bool,
    suspended: bool,
}

#[derive(Clone)]
struct Post {
    author: &'static str,
    locked: bool,
}

struct Request {
    action: &'static str,
    user: Option<User>,
    post: Option<Post>,
    predicates: Arc<PredicateTable<Request>>,
}

impl AccessContext for Request {
    fn action_name(&self) -> &str {
        self.action
    }

    fn predicate(&self, name: &str) -> Result<bool, EvaluationError> {
        self.predicates.call(name, self)
    }
}

fn predicates() -> PredicateTable<Request> {
    PredicateTable::new()
        .register("signed_in?", |r: &Request| r.user.is_some())
        .register("admin?", |r: &Request| r.user.as_ref().is_some_and(|u| u.admin))
        .register("suspended?", |r: &Request| {
            r.user.as_ref().is_some_and(|u| u.suspended)
        })
        .register("owner?", |r: &Request| match (&r.user, &r.post) {
            (Some(user), Some(post)) => user.name == post.author,
            _ => false,
        })
        .register("locked?", |r: &Request| r.post.as_ref().is_some_and(|p| p.locked))
}

/// Prints what a web framework would send.
struct Console;

impl DenyResponder for Console {
    fn redirect(&mut self, location: &str) -> Result<(), HostError> {
        println!("    -> 302 {location}");
        Ok(())
    }

    fn render(&mut self, target: &RenderTarget) -> Result<(), HostError> {
        println!("    -> {} {}", target.status.unwrap_or(200), target.template);
        Ok(())
    }

    fn run_callback(&mut self, name: &str) -> Result<bool, HostError> {
        println!("    -> callback {name}");
        Ok(false)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = HandlerRegistry::new();
    registry.define("Application", None, |b| b.deny_by_default())?;
    registry.define("Posts", Some("Application"), |b| {
        b.allow(["index", "show"], RuleOptions::new())
            .allow(["new", "create"], RuleOptions::new().when("signed_in?"))
            .allow(
                ["edit", "update", "destroy"],
                RuleOptions::new().when_any(["owner?", "admin?"]),
            )
            .deny(
                "destroy",
                RuleOptions::new()
                    .unless(ConditionValue::expr("admin? || (owner? && !locked?)"))
                    .render(RenderTarget::new("posts/locked")),
            )
    })?;
    registry.define("Admin", Some("Application"), |b| {
        b.allow(Actions::any(), RuleOptions::new().when("admin?"))
            .deny(
                Actions::any(),
                RuleOptions::new().when("suspended?").callback("notify_security"),
            )
    })?;

    let alice = User { name: "alice", admin: false, suspended: false };
    let root = User { name: "root", admin: true, suspended: true };
    let post = Post { author: "alice", locked: true };
    let table = Arc::new(predicates());

    let scenarios = [
        ("Posts", "index", None),
        ("Posts", "create", None),
        ("Posts", "edit", Some(&alice)),
        ("Posts", "destroy", Some(&alice)),
        ("Admin", "index", Some(&alice)),
        ("Admin", "index", Some(&root)),
    ];

    println!("--- Actiongate blog example ---");
    for (handler, action, user) in scenarios {
        let filter: AccessFilter = registry
            .filter(handler)
            .ok_or_else(|| format!("no handler {handler}"))?;
        let request = Request {
            action,
            user: user.cloned(),
            post: Some(post.clone()),
            predicates: Arc::clone(&table),
        };
        let who = user.map_or("guest", |u| u.name);
        println!("{handler}#{action} as {who}:");
        let decision = filter.check(&request, &mut Console)?;
        println!("    {:?}", decision.effect);
    }

    let rules = registry.get("Posts").ok_or("no Posts")?;
    println!("Posts inherits and declares {} rules", rules.len());
    Ok(())
}
