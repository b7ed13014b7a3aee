//! Integration tests for inbound requests through the gateway

use super::test_utils::{router, ScriptedBackend};
use requiredai::backend::{ModelConfig, ProviderType};
use requiredai::config::GatewayConfig;
use requiredai::engine::{ConvergenceConfig, ConvergenceEngine, SessionState};
use requiredai::error::GatewayError;
use requiredai::gateway::{AliasModel, Gateway, InboundRequest};
use requiredai::message::Message;
use requiredai::requirement::{Contains, RequirementRegistry};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn gateway(backend: Arc<ScriptedBackend>) -> Gateway {
    let engine = ConvergenceEngine::new(
        Arc::new(router(&[("m", backend)])),
        ConvergenceConfig::default(),
    );
    Gateway::new(Arc::new(RequirementRegistry::with_builtins()), engine)
}

const PICK_LABEL: &str = r#"{
    "model": "m",
    "max_tokens": 64,
    "temperature": 0.2,
    "messages": [{"role": "user", "content": "Pick A, B, or C"}],
    "requirements": [{"type": "Contains", "needles": ["(A)", "(B)", "(C)"]}]
}"#;

#[tokio::test]
async fn test_json_request_round_trip() {
    let backend = Arc::new(ScriptedBackend::script(
        "m",
        &["I think it's clear.", "(B) is correct."],
    ));
    let gateway = gateway(backend.clone());

    let response = gateway
        .complete(InboundRequest::from_json(PICK_LABEL).unwrap())
        .await
        .unwrap();
    assert_eq!(response.content(), "(B) is correct.");

    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["model"], "m");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["requirements"]["met"], true);
    assert_eq!(body["requirements"]["iterations"], 1);
    assert_eq!(body["usage"]["total_tokens"], 30);

    // The upstream never sees requirement documents.
    for call in backend.calls() {
        assert!(call.iter().all(|m| !m.content.contains("\"needles\"")));
    }
}

#[tokio::test]
async fn test_exhaustion_surfaces_unmet_requirements() {
    let backend = Arc::new(ScriptedBackend::script("m", &["nope"]));
    let gateway = gateway(backend);
    let mut request = InboundRequest::new("m", vec![Message::user("Pick A, B, or C")]);
    request.requirements = vec![
        json!({"type": "Contains", "needles": ["(A)"], "name": "label"}),
    ];

    let err = gateway.complete(request.clone()).await.unwrap_err();
    let body = err.to_body();
    assert_eq!(body["error"]["type"], "convergence_not_reached");
    assert_eq!(body["error"]["unmet"][0]["name"], "label");
    assert_eq!(body["error"]["best_effort"]["content"], "nope");

    request.include_prospects = true;
    let response = gateway.run(request).await.unwrap();
    assert!(!response.requirements.met);
    assert_eq!(response.choices[0].finish_reason, "requirements_not_met");
    assert_eq!(response.prospects.as_ref().map(Vec::len), Some(6));
}

#[tokio::test]
async fn test_request_shape_errors_make_no_backend_call() {
    let backend = Arc::new(ScriptedBackend::script("m", &["x"]));
    let gateway = gateway(backend.clone());

    let unknown_model = InboundRequest::new("ghost", vec![Message::user("hi")]);
    assert!(matches!(
        gateway.complete(unknown_model).await,
        Err(GatewayError::UnknownBackend(_))
    ));

    let mut malformed = InboundRequest::new("m", vec![Message::user("hi")]);
    malformed.requirements = vec![json!({"type": "Written", "phrasings": []})];
    let err = gateway.complete(malformed).await.unwrap_err();
    assert!(err.is_request_shape());

    assert!(matches!(
        InboundRequest::from_json("{\"model\": 3}"),
        Err(GatewayError::InvalidRequest(_))
    ));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_alias_prepends_its_requirements() {
    let backend = Arc::new(ScriptedBackend::script("m", &["alpha", "alpha beta"]));
    let gateway = gateway(backend.clone()).with_alias(
        "strict",
        AliasModel {
            target: "m".to_string(),
            requirements: vec![Arc::new(Contains::new(["beta"]))],
        },
    );
    let mut request = InboundRequest::new("strict", vec![Message::user("go")]);
    request.requirements = vec![json!({"type": "Contains", "needles": ["alpha"]})];

    let response = gateway.complete(request).await.unwrap();
    assert_eq!(response.model, "strict");
    assert_eq!(response.content(), "alpha beta");
    let revision = backend.calls()[1].last().cloned().unwrap();
    assert!(revision.content.contains("\"beta\""));
}

#[tokio::test]
async fn test_stop_cancels_running_session() {
    let backend = Arc::new(
        ScriptedBackend::script("m", &["no label"]).with_delay(Duration::from_millis(50)),
    );
    let gateway = gateway(backend);
    let mut request = InboundRequest::from_json(PICK_LABEL).unwrap();
    request.session_key = Some("job-7".to_string());

    let stopper = async {
        loop {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if let Some(snapshot) = gateway.status("job-7") {
                if snapshot.state == SessionState::Revising {
                    assert_eq!(snapshot.last_failing_index, Some(0));
                    break;
                }
            }
        }
        assert!(gateway.stop("job-7"));
    };
    let (result, ()) = tokio::join!(gateway.complete(request), stopper);

    assert!(matches!(result, Err(GatewayError::Cancelled)));
    assert!(!gateway.is_running("job-7"));
    assert!(!gateway.stop("job-7"));
}

#[tokio::test]
async fn test_duplicate_session_key_rejected() {
    let backend = Arc::new(
        ScriptedBackend::script("m", &["(A)"]).with_delay(Duration::from_millis(30)),
    );
    let gateway = gateway(backend);
    let mut first = InboundRequest::from_json(PICK_LABEL).unwrap();
    first.session_key = Some("same".to_string());
    let second = first.clone();

    let (a, b) = tokio::join!(gateway.complete(first), gateway.complete(second));
    assert!(a.is_ok());
    assert!(matches!(b, Err(GatewayError::InvalidRequest(_))));
}

#[test]
fn test_from_config_rejects_bad_alias_requirements() {
    let mut config = GatewayConfig::default();
    config.models.insert(
        "local".to_string(),
        ModelConfig {
            provider: ProviderType::Ollama,
            provider_model: "llama3".to_string(),
            ..ModelConfig::default()
        },
    );
    config.models.insert(
        "strict".to_string(),
        ModelConfig {
            provider: ProviderType::Alias,
            provider_model: "local".to_string(),
            requirements: vec![json!({"type": "Nope"})],
            ..ModelConfig::default()
        },
    );

    let result = Gateway::from_config(&config, RequirementRegistry::with_builtins());
    assert!(matches!(result, Err(GatewayError::ConfigError(msg)) if msg.contains("strict")));
}
