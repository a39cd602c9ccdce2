//! Randomized rule files: serialize, reload, compile, evaluate.
//!
//! Files are generated from seeded random bytes so failures replay.

use actiongate::{ConfigurationError, EvaluationError, FixedContext};
use actiongate_yaml::ast::RuleFile;
use actiongate_yaml::{compile, parse_rule_file, LoadError};
use arbitrary::{Arbitrary, Unstructured};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ACTIONS: [&str; 6] = ["index", "show", "edit", "update", "destroy", "unlisted"];
const PREDICATES: [&str; 4] = ["first?", "second?", "admin?", "owner?"];

fn random_file(seed: u64) -> Option<RuleFile> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bytes = vec![0u8; 512];
    rng.fill(&mut bytes[..]);
    RuleFile::arbitrary(&mut Unstructured::new(&bytes)).ok()
}

fn context(seed: u64, action: &str) -> FixedContext {
    let mut rng = StdRng::seed_from_u64(seed);
    PREDICATES
        .iter()
        .fold(FixedContext::new(action), |ctx, name| {
            ctx.with_predicate(*name, rng.gen())
        })
}

#[test]
fn random_files_load_or_fail_cleanly() {
    let mut compiled = 0;

    for seed in 0..300u64 {
        let Some(file) = random_file(seed) else { continue };

        let yaml = serde_yaml::to_string(&file).unwrap();
        let reparsed = parse_rule_file(&yaml)
            .unwrap_or_else(|e| panic!("seed {seed}: generated file does not parse: {e}\n{yaml}"));
        assert_eq!(reparsed.handlers.len(), file.handlers.len(), "seed {seed}");

        let registry = match compile(&reparsed) {
            Ok(registry) => registry,
            // Two guards on one rule, an unknown option key, too much
            // nesting or an expression that does not parse.
            Err(LoadError::Config {
                source:
                    ConfigurationError::MultipleConditions { .. }
                    | ConfigurationError::UnknownOption(_)
                    | ConfigurationError::ConditionTooDeep { .. }
                    | ConfigurationError::InvalidExpression { .. },
                ..
            }) => continue,
            Err(e) => panic!("seed {seed}: unexpected load error: {e}\n{yaml}"),
        };
        compiled += 1;

        for handler in registry.names() {
            let rules = registry.get(handler).unwrap();
            for action in ACTIONS {
                match rules.evaluate(&context(seed, action)) {
                    Ok(_) => {}
                    // Numbers, booleans, maps, non-list `_all`/`_any` values.
                    Err(EvaluationError::ConditionType { .. }) => {}
                    Err(e) => panic!("seed {seed}: {handler}#{action}: {e}\n{yaml}"),
                }
            }
        }
    }

    assert!(compiled > 0, "no random file compiled");
}

#[test]
fn children_never_lose_parent_rules() {
    for seed in 0..200u64 {
        let Some(file) = random_file(seed) else { continue };
        let Ok(registry) = compile(&file) else { continue };

        for handler in &file.handlers {
            let Some(parent) = &handler.parent else { continue };
            let child_len = registry.get(&handler.name).unwrap().len();
            let parent_len = registry.get(parent).unwrap().len();
            assert_eq!(child_len, parent_len + handler.rules.len(), "seed {seed}");
        }
    }
}
