//! Literal substring requirement.

use crate::error::GatewayError;
use crate::message::Message;
use crate::requirement::{
    response_text, serialize_fields, EvaluationContext, EvaluationError, Requirement,
    RequirementKind, Verdict,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Met when the response contains at least one needle.
///
/// Matching is case-sensitive and literal: `"(B)"` matches `"The answer is (B)."`
/// but not `"(b)"`. An empty needle set can never be met.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contains {
    #[serde(alias = "value")]
    needles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default, alias = "revision_model", skip_serializing_if = "Option::is_none")]
    model_override: Option<String>,
}

impl Contains {
    pub fn new<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            needles: needles.into_iter().map(Into::into).collect(),
            name: String::new(),
            model_override: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model_override(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    pub fn needles(&self) -> &BTreeSet<String> {
        &self.needles
    }

    pub fn is_met_by(&self, content: &str) -> bool {
        self.needles.iter().any(|needle| content.contains(needle.as_str()))
    }
}

impl RequirementKind for Contains {
    const TYPE_KEY: &'static str = "Contains";
}

#[async_trait]
impl Requirement for Contains {
    fn type_key(&self) -> &'static str {
        Self::TYPE_KEY
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_override(&self) -> Option<&str> {
        self.model_override.as_deref()
    }

    async fn evaluate(
        &self,
        conversation: &[Message],
        _ctx: &EvaluationContext<'_>,
    ) -> Result<Verdict, EvaluationError> {
        let content = response_text(conversation)?;
        Ok(Verdict::from_bool(self.is_met_by(content)))
    }

    fn explain(&self) -> String {
        if self.needles.is_empty() {
            return "This requirement lists no acceptable text and cannot be met.".to_string();
        }
        let quoted = self
            .needles
            .iter()
            .map(|needle| format!("\"{}\"", needle))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Your response must contain at least one of the following: {}.",
            quoted
        )
    }

    fn to_fields(&self) -> Result<Map<String, Value>, GatewayError> {
        serialize_fields(self, Self::TYPE_KEY)
    }
}
