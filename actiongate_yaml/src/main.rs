//! `actiongate`: check access decisions against a YAML rule file.
//!
//! ```text
//! actiongate check rules.yaml Posts edit -p admin?=true
//! actiongate list rules.yaml
//! ```

use std::path::PathBuf;

use actiongate::FixedContext;
use actiongate_yaml::{load_registry, report};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "actiongate")]
#[command(about = "Evaluate per-action allow/deny rules from a YAML rule file")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate one request against a handler type
    Check {
        /// Rule file
        file: PathBuf,
        /// Handler type name
        handler: String,
        /// Action name
        action: String,
        /// Predicate value, as `name=true` or `name=false`
        #[arg(short = 'p', long = "predicate", value_parser = parse_predicate)]
        predicates: Vec<(String, bool)>,
        /// Print JSON, including evaluation statistics
        #[arg(long)]
        json: bool,
    },
    /// List the handler types in a rule file
    List {
        /// Rule file
        file: PathBuf,
    },
}

fn parse_predicate(arg: &str) -> Result<(String, bool), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=true|false, got `{arg}`"))?;
    let value = value
        .parse::<bool>()
        .map_err(|_| format!("predicate `{name}` must be true or false"))?;
    Ok((name.to_string(), value))
}

fn main() -> Result<()> {
    // RUST_LOG=actiongate=debug shows rule-by-rule evaluation.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Check {
            file,
            handler,
            action,
            predicates,
            json,
        } => {
            let registry = load_registry(&file)
                .with_context(|| format!("loading {}", file.display()))?;
            let rules = registry
                .get(&handler)
                .ok_or_else(|| anyhow!("no handler type `{handler}` in {}", file.display()))?;

            let ctx = predicates
                .into_iter()
                .fold(FixedContext::new(action), |ctx, (name, value)| {
                    ctx.with_predicate(name, value)
                });
            let (verdict, stats) = rules
                .evaluate_with_stats(&ctx)
                .context("evaluating access")?;

            if json {
                println!("{}", report::verdict_json(&verdict, Some(&stats)));
            } else {
                println!("{}", report::describe(&verdict));
            }
        }
        Command::List { file } => {
            let registry = load_registry(&file)
                .with_context(|| format!("loading {}", file.display()))?;
            for line in report::list_handlers(&registry) {
                println!("{line}");
            }
        }
    }
    Ok(())
}
