//! Integration tests for the requirement registry and the built-in variants

use async_trait::async_trait;
use requiredai::backend::BackendRouter;
use requiredai::error::GatewayError;
use requiredai::message::Message;
use requiredai::requirement::{
    Contains, EvaluationContext, EvaluationError, JudgeConfig, Requirement, RequirementKind,
    RequirementRegistry, Verdict,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A requirement type defined outside the crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MaxWords {
    limit: usize,
}

impl RequirementKind for MaxWords {
    const TYPE_KEY: &'static str = "MaxWords";

    fn validate(&self) -> Result<(), String> {
        if self.limit == 0 {
            return Err("limit must be positive".to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl Requirement for MaxWords {
    fn type_key(&self) -> &'static str {
        Self::TYPE_KEY
    }

    fn name(&self) -> &str {
        ""
    }

    fn model_override(&self) -> Option<&str> {
        None
    }

    async fn evaluate(
        &self,
        conversation: &[Message],
        _ctx: &EvaluationContext<'_>,
    ) -> Result<Verdict, EvaluationError> {
        let last = conversation.last().ok_or(EvaluationError::EmptyConversation)?;
        Ok(Verdict::from_bool(
            last.content.split_whitespace().count() <= self.limit,
        ))
    }

    fn explain(&self) -> String {
        format!("Use at most {} words.", self.limit)
    }

    fn to_fields(&self) -> Result<Map<String, Value>, GatewayError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => Ok(fields),
            _ => Err(GatewayError::malformed(Self::TYPE_KEY, "not an object")),
        }
    }
}

fn conversation(reply: &str) -> Vec<Message> {
    vec![Message::user("Pick A, B, or C"), Message::assistant(reply)]
}

#[tokio::test]
async fn test_contains_semantics() {
    let router = BackendRouter::new();
    let judge = JudgeConfig::default();
    let ctx = EvaluationContext {
        router: &router,
        default_model: "m",
        judge: &judge,
    };

    let labels = Contains::new(["(A)", "(B)"]);
    assert!(labels
        .evaluate(&conversation("The answer is (B)."), &ctx)
        .await
        .unwrap()
        .satisfied);
    assert!(!labels
        .evaluate(&conversation("The answer is (D)."), &ctx)
        .await
        .unwrap()
        .satisfied);

    let empty = Contains::new(Vec::<String>::new());
    assert!(!empty
        .evaluate(&conversation(""), &ctx)
        .await
        .unwrap()
        .satisfied);
}

#[test]
fn test_custom_kind_registers_and_round_trips() {
    let mut registry = RequirementRegistry::with_builtins();
    registry.register_kind::<MaxWords>().unwrap();
    assert!(matches!(
        registry.register_kind::<MaxWords>(),
        Err(GatewayError::DuplicateTypeKey(key)) if key == "MaxWords"
    ));

    let requirement = registry
        .deserialize(&json!({"type": "MaxWords", "limit": 12}))
        .unwrap();
    assert_eq!(requirement.explain(), "Use at most 12 words.");
    assert_eq!(
        registry.serialize(requirement.as_ref()).unwrap(),
        json!({"type": "MaxWords", "limit": 12})
    );

    assert!(matches!(
        registry.deserialize(&json!({"type": "MaxWords", "limit": 0})),
        Err(GatewayError::MalformedRequirement { type_key, .. }) if type_key == "MaxWords"
    ));
}

#[test]
fn test_unknown_and_malformed_documents() {
    let registry = RequirementRegistry::with_builtins();
    assert!(matches!(
        registry.deserialize(&json!({"type": "Nonexistent", "x": 1})),
        Err(GatewayError::UnknownRequirementType(t)) if t == "Nonexistent"
    ));
    assert!(matches!(
        registry.deserialize(&json!({"needles": ["x"]})),
        Err(GatewayError::MalformedRequirement { .. })
    ));
    assert!(matches!(
        registry.deserialize(&json!({"type": "Written"})),
        Err(GatewayError::MalformedRequirement { type_key, .. }) if type_key == "Written"
    ));
    assert!(matches!(
        registry.deserialize(&json!({"type": "Regex", "positive_patterns": ["("]})),
        Err(GatewayError::MalformedRequirement { type_key, .. }) if type_key == "Regex"
    ));
}

#[test]
fn test_original_field_names_accepted() {
    let registry = RequirementRegistry::with_builtins();
    let docs = vec![
        json!({"type": "Contains", "value": ["(A)"], "revision_model": "fast"}),
        json!({"type": "Written", "value": ["Be brief."], "evaluation_model": "judge"}),
        json!({"type": "Regex", "positive_regexes": ["^\\d+$"], "additional_prompt": "Digits only."}),
    ];
    let requirements = registry.deserialize_all(&docs).unwrap();

    assert_eq!(requirements[0].model_override(), Some("fast"));
    assert_eq!(requirements[1].referenced_models(), vec!["judge"]);
    assert!(requirements[2].explain().contains("Digits only."));

    let canonical = registry.serialize_all(&requirements).unwrap();
    assert_eq!(canonical[0]["needles"], json!(["(A)"]));
    assert_eq!(canonical[0]["model_override"], "fast");
    assert_eq!(canonical[1]["phrasings"], json!(["Be brief."]));
    assert_eq!(canonical[2]["positive_patterns"], json!(["^\\d+$"]));

    let again = registry.deserialize_all(&canonical).unwrap();
    for (a, b) in requirements.iter().zip(again.iter()) {
        assert!(a.as_ref() == b.as_ref());
    }
}
