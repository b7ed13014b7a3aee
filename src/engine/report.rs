//! Session outcome and audit trail.

use crate::backend::TokenUsage;
use crate::error::{GatewayError, UnmetRequirement};
use crate::message::Message;
use serde::Serialize;

/// Result of evaluating one requirement against one prospect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Passed,
    Failed,
    /// The evaluator could not reach a verdict; counted as failed.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub index: usize,
    pub type_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub outcome: EvaluationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// What produced a revised prospect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevisionRecord {
    pub requirement_index: usize,
    pub instructions: String,
}

/// One candidate response and everything learned about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProspectRecord {
    /// 0 for the first draft, then one per revision.
    pub attempt: u32,
    pub model: String,
    pub message: Message,
    pub evaluations: Vec<EvaluationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<RevisionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConvergenceStatus {
    Converged,
    MaxIterations { unmet: Vec<UnmetRequirement> },
}

/// Terminal state of a session that did not hit a fatal error
#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceReport {
    pub session_id: String,
    /// Model that produced the final response.
    pub model: String,
    pub response: Message,
    #[serde(flatten)]
    pub status: ConvergenceStatus,
    /// Revision attempts performed.
    pub iterations: u32,
    pub prospects: Vec<ProspectRecord>,
    pub usage: TokenUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ConvergenceReport {
    pub fn is_converged(&self) -> bool {
        matches!(self.status, ConvergenceStatus::Converged)
    }

    pub fn unmet(&self) -> &[UnmetRequirement] {
        match &self.status {
            ConvergenceStatus::Converged => &[],
            ConvergenceStatus::MaxIterations { unmet } => unmet,
        }
    }

    /// The response when every requirement is met, otherwise
    /// `ConvergenceNotReached` carrying the best effort.
    pub fn into_result(self) -> Result<Message, GatewayError> {
        match self.status {
            ConvergenceStatus::Converged => Ok(self.response),
            ConvergenceStatus::MaxIterations { unmet } => Err(GatewayError::ConvergenceNotReached {
                iterations: self.iterations,
                unmet,
                best_effort: Box::new(self.response),
            }),
        }
    }
}
