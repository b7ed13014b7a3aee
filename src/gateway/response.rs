//! Outbound chat-completion response.

use crate::backend::TokenUsage;
use crate::engine::{ConvergenceReport, ProspectRecord};
use crate::error::UnmetRequirement;
use crate::message::Message;
use chrono::Utc;
use serde::Serialize;

pub const FINISH_REQUIREMENTS_NOT_MET: &str = "requirements_not_met";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: String,
}

/// Whether the returned content is guaranteed to satisfy the requirements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementsSummary {
    pub met: bool,
    pub iterations: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmet: Vec<UnmetRequirement>,
}

/// Chat-completion response in the usual provider shape
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: TokenUsage,
    pub requirements: RequirementsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prospects: Option<Vec<ProspectRecord>>,
}

impl ChatCompletionResponse {
    pub fn from_report(report: ConvergenceReport, model: &str, include_prospects: bool) -> Self {
        let met = report.is_converged();
        let unmet = report.unmet().to_vec();
        let finish_reason = if met {
            report
                .finish_reason
                .clone()
                .unwrap_or_else(|| "stop".to_string())
        } else {
            FINISH_REQUIREMENTS_NOT_MET.to_string()
        };

        Self {
            id: report.session_id,
            object: "chat.completion",
            created: Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: report.response,
                finish_reason,
            }],
            usage: report.usage,
            requirements: RequirementsSummary {
                met,
                iterations: report.iterations,
                unmet,
            },
            prospects: include_prospects.then_some(report.prospects),
        }
    }

    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .unwrap_or("")
    }
}
