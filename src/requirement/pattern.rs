//! Regular-expression requirement (`type: "Regex"`).

use crate::error::GatewayError;
use crate::message::Message;
use crate::requirement::{
    response_text, serialize_fields, EvaluationContext, EvaluationError, Requirement,
    RequirementKind, Verdict,
};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Serialized shape of a [`Pattern`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternFields {
    #[serde(default, alias = "positive_regexes")]
    pub positive_patterns: Vec<String>,
    #[serde(default, alias = "negative_regexes")]
    pub negative_patterns: Vec<String>,
    #[serde(default, alias = "additional_prompt", skip_serializing_if = "Option::is_none")]
    pub additional_guidance: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, alias = "revision_model", skip_serializing_if = "Option::is_none")]
    pub model_override: Option<String>,
}

/// Met when every positive pattern matches and no negative pattern does.
///
/// Patterns are compiled once at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PatternFields", into = "PatternFields")]
pub struct Pattern {
    fields: PatternFields,
    positive: Vec<Regex>,
    negative: Vec<Regex>,
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, String> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| format!("invalid pattern '{}': {}", p, e)))
        .collect()
}

impl TryFrom<PatternFields> for Pattern {
    type Error = String;

    fn try_from(fields: PatternFields) -> Result<Self, Self::Error> {
        Ok(Self {
            positive: compile(&fields.positive_patterns)?,
            negative: compile(&fields.negative_patterns)?,
            fields,
        })
    }
}

impl From<Pattern> for PatternFields {
    fn from(pattern: Pattern) -> Self {
        pattern.fields
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Pattern {
    pub fn new(fields: PatternFields) -> Result<Self, GatewayError> {
        Self::try_from(fields).map_err(|reason| GatewayError::malformed(Self::TYPE_KEY, reason))
    }

    pub fn fields(&self) -> &PatternFields {
        &self.fields
    }

    /// First pattern that breaks the rule, if any.
    fn violation(&self, content: &str) -> Option<String> {
        if let Some(missing) = self.positive.iter().find(|re| !re.is_match(content)) {
            return Some(format!("does not match {}", missing.as_str()));
        }
        self.negative
            .iter()
            .find(|re| re.is_match(content))
            .map(|re| format!("matches forbidden {}", re.as_str()))
    }
}

impl RequirementKind for Pattern {
    const TYPE_KEY: &'static str = "Regex";
}

#[async_trait]
impl Requirement for Pattern {
    fn type_key(&self) -> &'static str {
        Self::TYPE_KEY
    }

    fn name(&self) -> &str {
        &self.fields.name
    }

    fn model_override(&self) -> Option<&str> {
        self.fields.model_override.as_deref()
    }

    async fn evaluate(
        &self,
        conversation: &[Message],
        _ctx: &EvaluationContext<'_>,
    ) -> Result<Verdict, EvaluationError> {
        let content = response_text(conversation)?;
        Ok(match self.violation(content) {
            None => Verdict::met(),
            Some(detail) => Verdict::unmet().with_detail(detail),
        })
    }

    fn explain(&self) -> String {
        let block = |patterns: &[String]| format!("```txt\n{}\n```", patterns.join("\n"));
        let mut parts = Vec::new();
        if !self.fields.positive_patterns.is_empty() {
            parts.push(format!(
                "Your response must match these regex patterns:\n{}",
                block(&self.fields.positive_patterns)
            ));
        }
        if !self.fields.negative_patterns.is_empty() {
            parts.push(format!(
                "Your response must not match these regex patterns:\n{}",
                block(&self.fields.negative_patterns)
            ));
        }
        if let Some(guidance) = &self.fields.additional_guidance {
            parts.push(guidance.clone());
        }
        parts.join("\n")
    }

    fn to_fields(&self) -> Result<Map<String, Value>, GatewayError> {
        serialize_fields(&self.fields, Self::TYPE_KEY)
    }
}
