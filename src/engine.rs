//! Convergence Engine
//!
//! Drives one request through generate → evaluate → revise until every
//! requirement is met or the revision bound is reached.
//!
//! ## Loop
//!
//! 1. Route every model the request may use; an unknown one fails before any call.
//! 2. Generate the first draft with the default model. Backend failures are fatal.
//! 3. Evaluate requirements in declared order against
//!    `original_conversation + draft`, stopping at the first unmet one.
//!    Evaluation errors count as unmet; `K` consecutive errors from the same
//!    requirement abort with `RequirementEvaluationError`.
//! 4. Revise with the lowest-index unmet requirement's `explain()`, sending
//!    `original_conversation + draft + revision instructions` to its
//!    `model_override` or the default model. Go to 3.
//! 5. Once `max_iterations` revisions have been made, the last draft is
//!    evaluated against every requirement and the session ends with
//!    `MaxIterations` listing each one still unmet.

use crate::backend::{BackendRouter, CompletionOptions};
use crate::error::{GatewayError, UnmetRequirement};
use crate::message::{Conversation, Message};
use crate::requirement::{label, EvaluationContext, JudgeConfig, RequirementRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod evaluation;
pub mod report;
pub mod session;

use evaluation::{evaluate_pass, PassMode};
pub use report::{
    ConvergenceReport, ConvergenceStatus, EvaluationOutcome, EvaluationRecord, ProspectRecord,
    RevisionRecord,
};
pub use session::{
    ConvergenceSession, NoopObserver, SessionObserver, SessionSnapshot, SessionState,
};

pub const EXPLANATION_PLACEHOLDER: &str = "{explanation}";

/// Convergence configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Revision attempts before giving up; 0 evaluates the first draft only.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Consecutive evaluation errors from one requirement before the session aborts.
    #[serde(default = "default_max_consecutive_evaluation_errors")]
    pub max_consecutive_evaluation_errors: u32,

    #[serde(default = "default_revision_prompt_template")]
    pub revision_prompt_template: String,

    #[serde(default)]
    pub concurrent_evaluation: bool,

    #[serde(default)]
    pub judge: JudgeConfig,
}

fn default_max_iterations() -> u32 {
    5
}

fn default_max_consecutive_evaluation_errors() -> u32 {
    3
}

fn default_revision_prompt_template() -> String {
    "Your previous response did not meet the following requirement: {explanation} Please revise your response to meet this requirement."
        .to_string()
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_consecutive_evaluation_errors: default_max_consecutive_evaluation_errors(),
            revision_prompt_template: default_revision_prompt_template(),
            concurrent_evaluation: false,
            judge: JudgeConfig::default(),
        }
    }
}

impl ConvergenceConfig {
    /// Every problem found, in field order.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_consecutive_evaluation_errors == 0 {
            errors.push("max_consecutive_evaluation_errors must be at least 1".to_string());
        }
        if !self.revision_prompt_template.contains(EXPLANATION_PLACEHOLDER) {
            errors.push(format!(
                "revision_prompt_template must contain {}",
                EXPLANATION_PLACEHOLDER
            ));
        }
        if let Err(e) = self.judge.validate() {
            errors.push(e);
        }
        errors
    }

    pub fn revision_prompt(&self, explanation: &str) -> String {
        self.revision_prompt_template
            .replace(EXPLANATION_PLACEHOLDER, explanation)
    }
}

/// A chat completion with requirements attached
#[derive(Debug, Clone)]
pub struct ChatCompletionRequest {
    pub conversation: Conversation,
    pub default_model: String,
    pub max_tokens: Option<u32>,
    pub requirements: Vec<RequirementRef>,
    /// Provider parameters forwarded untouched (minus requirement fields).
    pub passthrough_params: Map<String, Value>,
}

impl ChatCompletionRequest {
    pub fn new(default_model: impl Into<String>, conversation: Conversation) -> Self {
        Self {
            conversation,
            default_model: default_model.into(),
            max_tokens: None,
            requirements: Vec::new(),
            passthrough_params: Map::new(),
        }
    }

    pub fn with_requirements(mut self, requirements: Vec<RequirementRef>) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Convergence engine
///
/// Holds only read-only collaborators, so one engine serves any number of
/// concurrent sessions.
#[derive(Clone)]
pub struct ConvergenceEngine {
    router: Arc<BackendRouter>,
    config: ConvergenceConfig,
}

impl ConvergenceEngine {
    pub fn new(router: Arc<BackendRouter>, config: ConvergenceConfig) -> Self {
        Self { router, config }
    }

    pub fn router(&self) -> &BackendRouter {
        &self.router
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    /// Run to a terminal state; exhaustion is reported, not raised.
    pub async fn run(&self, request: ChatCompletionRequest) -> Result<ConvergenceReport, GatewayError> {
        self.run_observed(request, &NoopObserver).await
    }

    /// Run and return the response only when every requirement is met.
    pub async fn complete(&self, request: ChatCompletionRequest) -> Result<Message, GatewayError> {
        self.run(request).await?.into_result()
    }

    pub async fn run_observed(
        &self,
        request: ChatCompletionRequest,
        observer: &dyn SessionObserver,
    ) -> Result<ConvergenceReport, GatewayError> {
        let ChatCompletionRequest {
            conversation,
            default_model,
            max_tokens,
            requirements,
            passthrough_params,
        } = request;

        if conversation.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "messages cannot be empty".to_string(),
            ));
        }
        self.check_routes(&default_model, &requirements)?;
        let options = CompletionOptions::from_params(max_tokens, passthrough_params)?;

        let mut session = ConvergenceSession::new(conversation, requirements.len());
        info!(
            session_id = session.id(),
            model = %default_model,
            requirements = requirements.len(),
            max_iterations = self.config.max_iterations,
            "Convergence session started"
        );

        let draft = self
            .router
            .complete(&default_model, session.original_conversation().to_vec(), &options)
            .await?;
        session.accept_draft(draft, None);
        session.transition(SessionState::Generated, observer);

        let ctx = EvaluationContext {
            router: &self.router,
            default_model: &default_model,
            judge: &self.config.judge,
        };

        loop {
            let exhausted = session.iteration_count() >= self.config.max_iterations;
            let mode = if exhausted {
                PassMode::Exhaustive
            } else {
                PassMode::ShortCircuit
            };

            session.transition(SessionState::Evaluating, observer);
            let candidate = session.candidate_conversation();
            let results = evaluate_pass(
                &requirements,
                &candidate,
                &ctx,
                mode,
                self.config.concurrent_evaluation,
            )
            .await;

            let mut failing = Vec::new();
            let mut fatal = None;
            for result in &results {
                match &result.outcome {
                    Err(e) => {
                        let streak = session.note_evaluation_error(result.index);
                        warn!(
                            session_id = session.id(),
                            iteration = session.iteration_count(),
                            requirement_index = result.index,
                            requirement_type = requirements[result.index].type_key(),
                            streak,
                            error = %e,
                            "Requirement evaluation error"
                        );
                        if streak >= self.config.max_consecutive_evaluation_errors && fatal.is_none() {
                            fatal = Some(GatewayError::RequirementEvaluationError {
                                index: result.index,
                                name: label(requirements[result.index].as_ref()).to_string(),
                                attempts: streak,
                                last_error: e.to_string(),
                            });
                        }
                    }
                    Ok(_) => session.reset_error_streak(result.index),
                }
                if !result.passed() {
                    failing.push(result.index);
                }
            }
            session.record_evaluations(results.iter().map(|r| r.record(&requirements)).collect());
            session.set_last_failing(failing.first().copied());

            if let Some(error) = fatal {
                session.transition(SessionState::Failed, observer);
                return Err(error);
            }

            let Some(&trigger) = failing.first() else {
                session.transition(SessionState::Converged, observer);
                info!(
                    session_id = session.id(),
                    iterations = session.iteration_count(),
                    "Requirements met"
                );
                return Ok(session.into_report(ConvergenceStatus::Converged));
            };

            if exhausted {
                let unmet = failing
                    .iter()
                    .map(|&index| UnmetRequirement {
                        index,
                        type_key: requirements[index].type_key().to_string(),
                        name: requirements[index].name().to_string(),
                    })
                    .collect::<Vec<_>>();
                session.transition(SessionState::Failed, observer);
                warn!(
                    session_id = session.id(),
                    iterations = session.iteration_count(),
                    unmet = unmet.len(),
                    "Revision bound reached"
                );
                return Ok(session.into_report(ConvergenceStatus::MaxIterations { unmet }));
            }

            let requirement = &requirements[trigger];
            let instructions = self.config.revision_prompt(&requirement.explain());
            let model = requirement.model_override().unwrap_or(&default_model);
            session.transition(SessionState::Revising, observer);
            debug!(
                session_id = session.id(),
                iteration = session.iteration_count() + 1,
                requirement_index = trigger,
                requirement_type = requirement.type_key(),
                model,
                "Revising"
            );

            let mut messages = candidate;
            messages.push(Message::user(instructions.clone()));
            let revised = self.router.complete(model, messages, &options).await?;
            session.accept_draft(
                revised,
                Some(RevisionRecord {
                    requirement_index: trigger,
                    instructions,
                }),
            );
        }
    }

    fn check_routes(
        &self,
        default_model: &str,
        requirements: &[RequirementRef],
    ) -> Result<(), GatewayError> {
        self.router.route(default_model)?;
        for requirement in requirements {
            for model in requirement.referenced_models() {
                self.router.route(model)?;
            }
        }
        Ok(())
    }
}
