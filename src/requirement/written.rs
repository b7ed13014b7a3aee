//! Semantic requirement judged by a model.

use crate::backend::CompletionOptions;
use crate::error::GatewayError;
use crate::message::Message;
use crate::requirement::judge::{build_judge_prompt, parse_verdict, prompt_tokens};
use crate::requirement::{
    response_text, serialize_fields, EvaluationContext, EvaluationError, Requirement,
    RequirementKind, Verdict,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

const DEFAULT_TOKEN_LIMIT: usize = 1024;

fn default_token_limit() -> usize {
    DEFAULT_TOKEN_LIMIT
}

/// Written requirement
///
/// `phrasings` are equivalent statements of one rule; the first is the
/// canonical one used as revision guidance. Phrasings and examples are packed
/// into a judge prompt bounded by `token_limit`, and the judge's strict
/// yes/no reply decides the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Written {
    #[serde(alias = "value")]
    phrasings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    positive_examples: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    negative_examples: Vec<String>,
    #[serde(default = "default_token_limit")]
    token_limit: usize,
    #[serde(default, alias = "evaluation_model", skip_serializing_if = "Option::is_none")]
    judge_model: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(default, alias = "revision_model", skip_serializing_if = "Option::is_none")]
    model_override: Option<String>,
}

impl Written {
    pub fn new(phrasings: Vec<String>) -> Self {
        Self {
            phrasings,
            positive_examples: Vec::new(),
            negative_examples: Vec::new(),
            token_limit: DEFAULT_TOKEN_LIMIT,
            judge_model: None,
            name: String::new(),
            model_override: None,
        }
    }

    pub fn with_examples(mut self, positive: Vec<String>, negative: Vec<String>) -> Self {
        self.positive_examples = positive;
        self.negative_examples = negative;
        self
    }

    pub fn with_token_limit(mut self, token_limit: usize) -> Self {
        self.token_limit = token_limit;
        self
    }

    pub fn with_judge_model(mut self, model: impl Into<String>) -> Self {
        self.judge_model = Some(model.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model_override(mut self, model: impl Into<String>) -> Self {
        self.model_override = Some(model.into());
        self
    }

    pub fn phrasings(&self) -> &[String] {
        &self.phrasings
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Judge: `judge_model`, then `model_override`, then the request default.
    pub fn judge_model_for<'a>(&'a self, default_model: &'a str) -> &'a str {
        self.judge_model
            .as_deref()
            .or(self.model_override.as_deref())
            .unwrap_or(default_model)
    }
}

impl RequirementKind for Written {
    const TYPE_KEY: &'static str = "Written";

    fn validate(&self) -> Result<(), String> {
        if self.phrasings.is_empty() {
            return Err("at least one phrasing is required".to_string());
        }
        if self.phrasings.iter().any(|p| p.trim().is_empty()) {
            return Err("phrasings cannot be blank".to_string());
        }
        if self.token_limit == 0 {
            return Err("token_limit must be positive".to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl Requirement for Written {
    fn type_key(&self) -> &'static str {
        Self::TYPE_KEY
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_override(&self) -> Option<&str> {
        self.model_override.as_deref()
    }

    fn referenced_models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.model_override.as_deref().into_iter().collect();
        if let Some(judge) = self.judge_model.as_deref() {
            if !models.contains(&judge) {
                models.push(judge);
            }
        }
        models
    }

    async fn evaluate(
        &self,
        conversation: &[Message],
        ctx: &EvaluationContext<'_>,
    ) -> Result<Verdict, EvaluationError> {
        let content = response_text(conversation)?;
        let model = self.judge_model_for(ctx.default_model);
        let adapter = ctx
            .router
            .adapter(model)
            .map_err(|e| EvaluationError::JudgeUnavailable(e.to_string()))?;

        let (guidance, messages) = build_judge_prompt(
            ctx.judge,
            &self.phrasings,
            &self.positive_examples,
            &self.negative_examples,
            content,
            self.token_limit,
            |text| adapter.estimate_tokens(text),
        )?;
        debug!(
            judge = model,
            phrasings = guidance.phrasings.len(),
            positives = guidance.positive_examples.len(),
            negatives = guidance.negative_examples.len(),
            guidance_tokens = guidance.tokens,
            prompt_tokens = prompt_tokens(&messages, |text| adapter.estimate_tokens(text)),
            token_limit = self.token_limit,
            "Judge prompt packed"
        );

        let options = CompletionOptions {
            max_tokens: Some(ctx.judge.max_tokens),
            temperature: Some(ctx.judge.temperature),
            ..Default::default()
        };
        let reply = ctx
            .router
            .complete(model, messages, &options)
            .await
            .map_err(|e| EvaluationError::JudgeUnavailable(e.to_string()))?;

        let satisfied = parse_verdict(&reply.message.content, ctx.judge)?;
        Ok(Verdict::from_bool(satisfied).with_detail(reply.message.content))
    }

    fn explain(&self) -> String {
        self.phrasings.first().cloned().unwrap_or_default()
    }

    fn to_fields(&self) -> Result<Map<String, Value>, GatewayError> {
        serialize_fields(self, Self::TYPE_KEY)
    }
}
