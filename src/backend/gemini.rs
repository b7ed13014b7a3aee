//! Google Gemini `generateContent` adapter.

use crate::backend::{
    build_provider_http_client, error_for_status, invalid_response, map_http_error,
    BackendAdapter, CompletionOptions, CompletionResponse, TokenUsage,
};
use crate::error::{BackendErrorKind, GatewayError};
use crate::message::{Message, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider client
pub struct GeminiClient {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        model: String,
        api_key: String,
        base_url: Option<String>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: build_provider_http_client()?,
            model,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Leading system messages become the system instruction. A system message
    /// after the first turn is sent as a user turn marked `from system:`.
    fn request_body(&self, messages: &[Message], options: &CompletionOptions) -> Value {
        let leading = messages
            .iter()
            .take_while(|m| m.role == Role::System)
            .count();
        let instruction = messages[..leading]
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let contents: Vec<Value> = messages[leading..]
            .iter()
            .map(|m| {
                let (role, text) = match m.role {
                    Role::System => ("user", format!("from system:\n{}", m.content)),
                    Role::Assistant => ("model", m.content.clone()),
                    Role::User => ("user", m.content.clone()),
                };
                json!({"role": role, "parts": [{"text": text}]})
            })
            .collect();

        let mut generation = Map::new();
        if let Some(max_tokens) = options.max_tokens {
            generation.insert("maxOutputTokens".to_string(), json!(max_tokens));
        }
        if let Some(temperature) = options.temperature {
            generation.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = options.top_p {
            generation.insert("topP".to_string(), json!(top_p));
        }
        if let Some(stop) = &options.stop {
            generation.insert("stopSequences".to_string(), json!(stop));
        }

        let mut body = json!({ "contents": contents });
        if !instruction.is_empty() {
            body["systemInstruction"] = json!({"parts": [{"text": instruction}]});
        }
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation);
        }
        body
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

fn into_completion(
    response: GenerateContentResponse,
    model: &str,
) -> Result<CompletionResponse, GatewayError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map(|r| format!("Gemini blocked the response: {}", r))
            .unwrap_or_else(|| "Gemini returned no candidates".to_string());
        return Err(GatewayError::backend(BackendErrorKind::InvalidResponse, reason));
    };

    let content: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let usage = response
        .usage_metadata
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
        .unwrap_or_default();

    Ok(CompletionResponse {
        message: Message::assistant(content),
        model: model.to_string(),
        usage,
        finish_reason: candidate.finish_reason.map(|r| r.to_ascii_lowercase()),
    })
}

#[async_trait]
impl BackendAdapter for GeminiClient {
    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, GatewayError> {
        let body = self.request_body(&messages, &options);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(invalid_response)?;
        into_completion(parsed, &self.model)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
