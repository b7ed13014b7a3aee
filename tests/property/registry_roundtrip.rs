//! Registry round-trips: deserialize(serialize(r)) == r for every built-in variant

use proptest::prelude::*;
use requiredai::requirement::pattern::PatternFields;
use requiredai::requirement::{Contains, Pattern, RequirementRef, RequirementRegistry, Written};
use std::sync::Arc;

fn text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9 ().,'!?-]{0,23}"
}

fn model() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z][a-z0-9-]{0,11}")
}

fn name() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-z][a-z0-9-]{0,11}"]
}

fn contains() -> impl Strategy<Value = RequirementRef> {
    (prop::collection::vec(text(), 0..6), name(), model()).prop_map(|(needles, name, model)| {
        let mut requirement = Contains::new(needles).with_name(name);
        if let Some(model) = model {
            requirement = requirement.with_model_override(model);
        }
        Arc::new(requirement) as RequirementRef
    })
}

fn written() -> impl Strategy<Value = RequirementRef> {
    (
        prop::collection::vec(text(), 1..4),
        prop::collection::vec(text(), 0..4),
        prop::collection::vec(text(), 0..4),
        1usize..4096,
        model(),
        name(),
    )
        .prop_map(|(phrasings, positive, negative, limit, judge, name)| {
            let mut requirement = Written::new(phrasings)
                .with_examples(positive, negative)
                .with_token_limit(limit)
                .with_name(name);
            if let Some(judge) = judge {
                requirement = requirement.with_judge_model(judge);
            }
            Arc::new(requirement) as RequirementRef
        })
}

fn pattern() -> impl Strategy<Value = RequirementRef> {
    // Literal-ish patterns so every generated one compiles.
    let literal = "[a-z0-9]{1,8}";
    (
        prop::collection::vec(literal, 0..3),
        prop::collection::vec(literal, 0..3),
        prop::option::of(text()),
        model(),
    )
        .prop_map(|(positive, negative, guidance, model)| {
            let fields = PatternFields {
                positive_patterns: positive.iter().map(|p| format!("^{}", p)).collect(),
                negative_patterns: negative,
                additional_guidance: guidance,
                name: String::new(),
                model_override: model,
            };
            Arc::new(Pattern::new(fields).unwrap()) as RequirementRef
        })
}

proptest! {
    #[test]
    fn prop_builtin_requirements_round_trip(
        requirement in prop_oneof![contains(), written(), pattern()]
    ) {
        let registry = RequirementRegistry::with_builtins();
        let doc = registry.serialize(requirement.as_ref()).unwrap();
        prop_assert_eq!(doc["type"].as_str(), Some(requirement.type_key()));

        let restored = registry.deserialize(&doc).unwrap();
        prop_assert!(restored.as_ref() == requirement.as_ref());
        prop_assert_eq!(restored.explain(), requirement.explain());
        prop_assert_eq!(registry.serialize(restored.as_ref()).unwrap(), doc);
    }

    #[test]
    fn prop_unregistered_type_is_rejected(type_key in "[A-Z][a-zA-Z]{2,12}") {
        let registry = RequirementRegistry::with_builtins();
        prop_assume!(!registry.is_registered(&type_key));
        let doc = serde_json::json!({"type": type_key.clone()});
        let rejected = matches!(
            registry.deserialize(&doc),
            Err(requiredai::error::GatewayError::UnknownRequirementType(t)) if t == type_key
        );
        prop_assert!(rejected);
    }
}
