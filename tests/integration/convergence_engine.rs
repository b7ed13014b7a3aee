//! Integration tests for the convergence loop against scripted backends

use super::test_utils::{is_judge_call, router, ScriptedBackend};
use requiredai::engine::{
    ChatCompletionRequest, ConvergenceConfig, ConvergenceEngine, ConvergenceStatus,
    EvaluationOutcome,
};
use requiredai::error::{BackendErrorKind, GatewayError};
use requiredai::message::{Message, Role};
use requiredai::requirement::{Contains, Requirement, RequirementRef, Written};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn engine(backends: &[(&str, Arc<ScriptedBackend>)], config: ConvergenceConfig) -> ConvergenceEngine {
    ConvergenceEngine::new(Arc::new(router(backends)), config)
}

fn bounded(max_iterations: u32) -> ConvergenceConfig {
    ConvergenceConfig {
        max_iterations,
        ..ConvergenceConfig::default()
    }
}

fn request(requirements: Vec<RequirementRef>) -> ChatCompletionRequest {
    ChatCompletionRequest::new("m", vec![Message::user("Pick A, B, or C")])
        .with_requirements(requirements)
}

#[tokio::test]
async fn test_pick_a_label_converges_after_one_revision() {
    let backend = Arc::new(ScriptedBackend::script(
        "m",
        &["I think it's clear.", "(B) is correct."],
    ));
    let engine = engine(&[("m", backend.clone())], ConvergenceConfig::default());

    let report = engine
        .run(request(vec![Arc::new(Contains::new(["(A)", "(B)", "(C)"]))]))
        .await
        .unwrap();

    assert!(report.is_converged());
    assert_eq!(report.iterations, 1);
    assert_eq!(report.response, Message::assistant("(B) is correct."));
    assert_eq!(backend.call_count(), 2);
    assert_eq!(report.prospects.len(), 2);
    assert_eq!(
        report.prospects[0].evaluations[0].outcome,
        EvaluationOutcome::Failed
    );
}

#[tokio::test]
async fn test_lowest_failing_index_drives_revision() {
    let first = Contains::new(["alpha"]);
    let second = Contains::new(["beta"]);

    for concurrent in [false, true] {
        let backend = Arc::new(ScriptedBackend::script("m", &["neither", "alpha beta"]));
        let config = ConvergenceConfig {
            concurrent_evaluation: concurrent,
            ..ConvergenceConfig::default()
        };
        let engine = engine(&[("m", backend.clone())], config.clone());
        engine
            .run(request(vec![
                Arc::new(first.clone()),
                Arc::new(second.clone()),
            ]))
            .await
            .unwrap();

        let revision = backend.calls()[1].last().cloned().unwrap();
        assert_eq!(revision.role, Role::User);
        assert_eq!(revision.content, config.revision_prompt(&first.explain()));
    }
}

#[tokio::test]
async fn test_concurrent_tie_break_ignores_completion_order() {
    let finished = Arc::new(Mutex::new(Vec::new()));
    let judge = |label: &'static str| {
        let finished = finished.clone();
        move |index: usize, _: &[Message]| {
            finished.lock().push(label);
            Ok::<_, GatewayError>(if index == 0 { "no" } else { "yes" }.to_string())
        }
    };
    let slow = Arc::new(
        ScriptedBackend::with_responder("slow-judge", judge("first"))
            .with_delay(Duration::from_millis(40)),
    );
    let fast = Arc::new(ScriptedBackend::with_responder("fast-judge", judge("second")));
    let writer = Arc::new(ScriptedBackend::script("m", &["draft", "revised"]));

    let first = Written::new(vec!["Mention alpha.".to_string()]).with_judge_model("slow-judge");
    let second = Written::new(vec!["Mention beta.".to_string()]).with_judge_model("fast-judge");
    let config = ConvergenceConfig {
        concurrent_evaluation: true,
        ..ConvergenceConfig::default()
    };
    let engine = engine(
        &[
            ("m", writer.clone()),
            ("slow-judge", slow),
            ("fast-judge", fast),
        ],
        config.clone(),
    );

    let report = engine
        .run(request(vec![Arc::new(first.clone()), Arc::new(second)]))
        .await
        .unwrap();

    assert!(report.is_converged());
    assert_eq!(finished.lock()[..2], ["second", "first"]);
    assert_eq!(writer.call_count(), 2);
    let revision = writer.calls()[1].last().cloned().unwrap();
    assert_eq!(revision.content, config.revision_prompt(&first.explain()));
}

#[tokio::test]
async fn test_revision_context_holds_only_latest_draft() {
    let backend = Arc::new(ScriptedBackend::script(
        "m",
        &["draft zero", "draft one", "draft two (A)"],
    ));
    let requirement = Contains::new(["(A)"]);
    let config = ConvergenceConfig::default();
    let engine = engine(&[("m", backend.clone())], config.clone());

    let report = engine
        .run(request(vec![Arc::new(requirement.clone())]))
        .await
        .unwrap();
    assert_eq!(report.iterations, 2);

    let instructions = Message::user(config.revision_prompt(&requirement.explain()));
    let calls = backend.calls();
    assert_eq!(
        calls[2],
        vec![
            Message::user("Pick A, B, or C"),
            Message::assistant("draft one"),
            instructions,
        ]
    );
    assert!(calls[2].iter().all(|m| m.content != "draft zero"));
}

#[tokio::test]
async fn test_revision_that_breaks_another_requirement_is_revised_again() {
    // The first revision satisfies R1 but not R2; R2 must then drive a second revision.
    let r1 = Contains::new(["one"]);
    let r2 = Contains::new(["two"]);
    let backend = Arc::new(ScriptedBackend::script("m", &["nothing", "one", "one two"]));
    let config = ConvergenceConfig::default();
    let engine = engine(&[("m", backend.clone())], config.clone());

    let report = engine
        .run(request(vec![Arc::new(r1.clone()), Arc::new(r2.clone())]))
        .await
        .unwrap();

    assert!(report.is_converged());
    assert_eq!(report.iterations, 2);
    let calls = backend.calls();
    assert_eq!(
        calls[1].last().unwrap().content,
        config.revision_prompt(&r1.explain())
    );
    assert_eq!(
        calls[2].last().unwrap().content,
        config.revision_prompt(&r2.explain())
    );
    assert_eq!(report.prospects[1].revision.as_ref().unwrap().requirement_index, 0);
    assert_eq!(report.prospects[2].revision.as_ref().unwrap().requirement_index, 1);
}

#[tokio::test]
async fn test_bound_stops_after_exactly_n_revisions() {
    let backend = Arc::new(ScriptedBackend::script("m", &["never"]));
    let engine = engine(&[("m", backend.clone())], bounded(3));

    let report = engine
        .run(request(vec![
            Arc::new(Contains::new(["x"]).with_name("needs-x")),
            Arc::new(Contains::new(["y"])),
        ]))
        .await
        .unwrap();

    assert_eq!(report.iterations, 3);
    assert_eq!(backend.call_count(), 4);
    let ConvergenceStatus::MaxIterations { unmet } = &report.status else {
        panic!("expected exhaustion, got {:?}", report.status);
    };
    let indices: Vec<usize> = unmet.iter().map(|u| u.index).collect();
    assert_eq!(indices, vec![0, 1]);
    assert_eq!(unmet[0].name, "needs-x");

    let err = report.into_result().unwrap_err();
    assert!(matches!(
        err,
        GatewayError::ConvergenceNotReached { iterations: 3, .. }
    ));
}

#[tokio::test]
async fn test_zero_bound_evaluates_first_draft_only() {
    let backend = Arc::new(ScriptedBackend::script("m", &["no"]));
    let engine = engine(&[("m", backend.clone())], bounded(0));

    let report = engine
        .run(request(vec![Arc::new(Contains::new(["yes"]))]))
        .await
        .unwrap();
    assert!(!report.is_converged());
    assert_eq!(report.iterations, 0);
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_written_judge_runs_in_isolated_call() {
    let backend = Arc::new(ScriptedBackend::with_responder("m", |index, messages| {
        if is_judge_call(messages) {
            let text = &messages.last().unwrap().content;
            Ok(if text.contains("Dear") { "Yes." } else { "no" }.to_string())
        } else if index == 0 {
            Ok("hey there".to_string())
        } else {
            Ok("Dear reader, hello.".to_string())
        }
    }));
    let written = Written::new(vec!["The reply opens with a formal salutation.".to_string()]);
    let engine = engine(&[("m", backend.clone())], ConvergenceConfig::default());

    let report = engine
        .run(request(vec![Arc::new(written.clone())]))
        .await
        .unwrap();
    assert!(report.is_converged());
    assert_eq!(report.response.content, "Dear reader, hello.");

    // generate, judge, revise, judge
    let calls = backend.calls();
    assert_eq!(calls.len(), 4);
    assert!(is_judge_call(&calls[1]));
    // The revision carries no trace of the judge exchange.
    assert_eq!(calls[2].len(), 3);
    assert!(!calls[2].iter().any(|m| m.content.contains("Text to evaluate")));
    assert!(calls[2][2].content.contains(&written.explain()));
}

#[tokio::test]
async fn test_judge_model_and_override_are_routed_separately() {
    let main = Arc::new(ScriptedBackend::script("main", &["draft"]));
    let judge = Arc::new(ScriptedBackend::script("judge", &["no", "yes"]));
    let reviser = Arc::new(ScriptedBackend::script("reviser", &["revised"]));
    let engine = engine(
        &[
            ("main", main.clone()),
            ("judge", judge.clone()),
            ("reviser", reviser.clone()),
        ],
        ConvergenceConfig::default(),
    );

    let written = Written::new(vec!["Be concise.".to_string()])
        .with_judge_model("judge")
        .with_model_override("reviser");
    let report = engine
        .run(
            ChatCompletionRequest::new("main", vec![Message::user("hi")])
                .with_requirements(vec![Arc::new(written)]),
        )
        .await
        .unwrap();

    assert!(report.is_converged());
    assert_eq!(report.model, "reviser");
    assert_eq!(main.call_count(), 1);
    assert_eq!(judge.call_count(), 2);
    assert_eq!(reviser.call_count(), 1);
}

#[tokio::test]
async fn test_persistently_unparsable_judge_escalates() {
    let backend = Arc::new(ScriptedBackend::with_responder("m", |_, messages| {
        Ok(if is_judge_call(messages) {
            "maybe".to_string()
        } else {
            "draft".to_string()
        })
    }));
    let config = ConvergenceConfig {
        max_consecutive_evaluation_errors: 3,
        ..ConvergenceConfig::default()
    };
    let engine = engine(&[("m", backend.clone())], config);

    let err = engine
        .run(request(vec![Arc::new(
            Written::new(vec!["Be polite.".to_string()]).with_name("polite"),
        )]))
        .await
        .unwrap_err();

    match err {
        GatewayError::RequirementEvaluationError {
            index,
            name,
            attempts,
            ..
        } => {
            assert_eq!(index, 0);
            assert_eq!(name, "polite");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_single_judge_hiccup_is_fail_closed() {
    let backend = Arc::new(ScriptedBackend::with_responder("m", |index, messages| {
        Ok(match (is_judge_call(messages), index) {
            (true, 1) => "I cannot say".to_string(),
            (true, _) => "yes".to_string(),
            (false, 0) => "first".to_string(),
            (false, _) => "second".to_string(),
        })
    }));
    let engine = engine(&[("m", backend.clone())], ConvergenceConfig::default());

    let report = engine
        .run(request(vec![Arc::new(Written::new(vec!["Anything.".to_string()]))]))
        .await
        .unwrap();
    assert!(report.is_converged());
    assert_eq!(report.iterations, 1);
    assert_eq!(
        report.prospects[0].evaluations[0].outcome,
        EvaluationOutcome::Error
    );
}

#[tokio::test]
async fn test_generation_failure_is_fatal() {
    let backend = Arc::new(ScriptedBackend::failing("m", BackendErrorKind::RateLimit));
    let engine = engine(&[("m", backend.clone())], ConvergenceConfig::default());

    let err = engine
        .run(request(vec![Arc::new(Contains::new(["x"]))]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::BackendError {
            kind: BackendErrorKind::RateLimit,
            ..
        }
    ));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_unknown_override_rejected_before_any_call() {
    let backend = Arc::new(ScriptedBackend::script("m", &["x"]));
    let engine = engine(&[("m", backend.clone())], ConvergenceConfig::default());

    let err = engine
        .run(request(vec![Arc::new(
            Contains::new(["x"]).with_model_override("missing"),
        )]))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnknownBackend(m) if m == "missing"));
    assert_eq!(backend.call_count(), 0);
}
