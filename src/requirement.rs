//! Requirements
//!
//! A requirement is an immutable policy object checked against the last
//! message of a conversation. Variants are closed data shapes registered by
//! type key in a [`RequirementRegistry`]; the engine only sees them through the
//! [`Requirement`] trait.

use crate::backend::BackendRouter;
use crate::error::GatewayError;
use crate::message::Message;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod contains;
pub mod judge;
pub mod pattern;
pub mod registry;
pub mod written;

pub use contains::Contains;
pub use judge::JudgeConfig;
pub use pattern::Pattern;
pub use registry::{RequirementFactory, RequirementKind, RequirementRegistry};
pub use written::Written;

/// Shared handle to a requirement instance.
pub type RequirementRef = Arc<dyn Requirement>;

/// Outcome of one successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub satisfied: bool,
    /// Evaluator-specific note kept for the audit trail (e.g. the judge's raw reply).
    pub detail: Option<String>,
}

impl Verdict {
    pub fn met() -> Self {
        Self {
            satisfied: true,
            detail: None,
        }
    }

    pub fn unmet() -> Self {
        Self {
            satisfied: false,
            detail: None,
        }
    }

    pub fn from_bool(satisfied: bool) -> Self {
        Self {
            satisfied,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Evaluation failed to produce a verdict.
///
/// The engine treats these as "not met" and counts consecutive occurrences
/// per requirement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("Judge reply is not a verdict: {0:?}")]
    UnparsableVerdict(String),

    #[error("No phrasing fits the judge token budget of {0}")]
    PromptOverBudget(usize),

    #[error("Judge call failed: {0}")]
    JudgeUnavailable(String),

    #[error("Conversation has no message to evaluate")]
    EmptyConversation,
}

/// Read-only collaborators an evaluation may use.
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub router: &'a BackendRouter,
    pub default_model: &'a str,
    pub judge: &'a JudgeConfig,
}

/// Requirement capability set
#[async_trait]
pub trait Requirement: Send + Sync + fmt::Debug {
    /// Registered type key, written as `type` in the serialized form.
    fn type_key(&self) -> &'static str;

    /// Instance name used in diagnostics; may be empty.
    fn name(&self) -> &str;

    /// Model that revises (and by default judges) for this requirement.
    fn model_override(&self) -> Option<&str>;

    /// Every model identifier this requirement may call.
    fn referenced_models(&self) -> Vec<&str> {
        self.model_override().into_iter().collect()
    }

    /// Judge whether the last message of `conversation` satisfies the requirement.
    async fn evaluate(
        &self,
        conversation: &[Message],
        ctx: &EvaluationContext<'_>,
    ) -> Result<Verdict, EvaluationError>;

    /// Revision guidance. Depends only on the requirement's own fields.
    fn explain(&self) -> String;

    /// Serialized fields, without the `type` tag.
    fn to_fields(&self) -> Result<Map<String, Value>, GatewayError>;
}

impl PartialEq for dyn Requirement {
    fn eq(&self, other: &Self) -> bool {
        if self.type_key() != other.type_key() {
            return false;
        }
        match (self.to_fields(), other.to_fields()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Display label: the instance name when set, otherwise the type key.
pub fn label(requirement: &dyn Requirement) -> &str {
    if requirement.name().is_empty() {
        requirement.type_key()
    } else {
        requirement.name()
    }
}

pub(crate) fn serialize_fields<T: Serialize>(
    value: &T,
    type_key: &str,
) -> Result<Map<String, Value>, GatewayError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(GatewayError::malformed(type_key, "fields must serialize to an object")),
        Err(e) => Err(GatewayError::malformed(type_key, e.to_string())),
    }
}

/// Content under evaluation: the last message.
pub(crate) fn response_text(conversation: &[Message]) -> Result<&str, EvaluationError> {
    conversation
        .last()
        .map(|message| message.content.as_str())
        .ok_or(EvaluationError::EmptyConversation)
}
