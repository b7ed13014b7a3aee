//! Error types for the RequiredAI gateway.

use crate::message::Message;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Upstream failure category, used to keep provider errors distinguishable
/// without leaking provider-specific types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    Auth,
    RateLimit,
    ModelNotFound,
    RequestFailed,
    Transport,
    InvalidResponse,
}

impl BackendErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendErrorKind::Auth => "auth",
            BackendErrorKind::RateLimit => "rate_limit",
            BackendErrorKind::ModelNotFound => "model_not_found",
            BackendErrorKind::RequestFailed => "request_failed",
            BackendErrorKind::Transport => "transport",
            BackendErrorKind::InvalidResponse => "invalid_response",
        }
    }
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requirement that was still unmet when a session gave up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmetRequirement {
    pub index: usize,
    pub type_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl fmt::Display for UnmetRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "#{} ({})", self.index, self.type_key)
        } else {
            write!(f, "#{} {} ({})", self.index, self.name, self.type_key)
        }
    }
}

fn join_unmet(unmet: &[UnmetRequirement]) -> String {
    unmet
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Gateway-wide error type
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Requirement type already registered: {0}")]
    DuplicateTypeKey(String),

    #[error("Unknown requirement type: {0}")]
    UnknownRequirementType(String),

    #[error("Malformed {type_key} requirement: {reason}")]
    MalformedRequirement { type_key: String, reason: String },

    #[error("No backend configured for model: {0}")]
    UnknownBackend(String),

    #[error("Backend error ({kind}): {message}")]
    BackendError {
        kind: BackendErrorKind,
        message: String,
    },

    #[error("Requirement #{index} ({name}) failed to evaluate {attempts} times in a row: {last_error}")]
    RequirementEvaluationError {
        index: usize,
        name: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Requirements not met after {iterations} revision(s): {}", join_unmet(unmet))]
    ConvergenceNotReached {
        iterations: u32,
        unmet: Vec<UnmetRequirement>,
        best_effort: Box<Message>,
    },

    #[error("Session cancelled")]
    Cancelled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl GatewayError {
    pub fn backend(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        GatewayError::BackendError {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed(type_key: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::MalformedRequirement {
            type_key: type_key.into(),
            reason: reason.into(),
        }
    }

    /// Stable slug for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::DuplicateTypeKey(_) => "duplicate_type_key",
            GatewayError::UnknownRequirementType(_) => "unknown_requirement_type",
            GatewayError::MalformedRequirement { .. } => "malformed_requirement",
            GatewayError::UnknownBackend(_) => "unknown_backend",
            GatewayError::BackendError { .. } => "backend_error",
            GatewayError::RequirementEvaluationError { .. } => "requirement_evaluation_error",
            GatewayError::ConvergenceNotReached { .. } => "convergence_not_reached",
            GatewayError::Cancelled => "cancelled",
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::ConfigError(_) => "config_error",
        }
    }

    /// Errors detected before any backend call was made.
    pub fn is_request_shape(&self) -> bool {
        matches!(
            self,
            GatewayError::UnknownRequirementType(_)
                | GatewayError::MalformedRequirement { .. }
                | GatewayError::UnknownBackend(_)
                | GatewayError::InvalidRequest(_)
        )
    }

    /// JSON error body in the shape chat-completion clients expect.
    pub fn to_body(&self) -> Value {
        let mut error = json!({
            "type": self.kind(),
            "message": self.to_string(),
        });
        match self {
            GatewayError::BackendError { kind, .. } => {
                error["backend_kind"] = json!(kind);
            }
            GatewayError::RequirementEvaluationError {
                index, attempts, ..
            } => {
                error["requirement_index"] = json!(index);
                error["attempts"] = json!(attempts);
            }
            GatewayError::ConvergenceNotReached {
                iterations,
                unmet,
                best_effort,
            } => {
                error["iterations"] = json!(iterations);
                error["unmet"] = json!(unmet);
                error["best_effort"] = json!(best_effort);
            }
            _ => {}
        }
        json!({ "error": error })
    }
}

impl From<config::ConfigError> for GatewayError {
    fn from(err: config::ConfigError) -> Self {
        GatewayError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::InvalidRequest(err.to_string())
    }
}
