//! OpenAI-compatible chat completions.
//!
//! Serves OpenAI itself, Groq and other hosted endpoints that speak the same
//! protocol, Ollama's `/v1` surface, and custom local servers.

use crate::backend::{
    build_provider_http_client, error_for_status, invalid_response, map_http_error,
    BackendAdapter, CompletionOptions, CompletionResponse, TokenUsage,
};
use crate::error::{BackendErrorKind, GatewayError};
use crate::message::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(flatten)]
    options: &'a CompletionOptions,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Client for any endpoint speaking the OpenAI chat-completions protocol
pub struct OpenAICompatibleClient {
    client: Client,
    provider: &'static str,
    model: String,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAICompatibleClient {
    pub fn openai(
        model: String,
        api_key: String,
        base_url: Option<String>,
    ) -> Result<Self, GatewayError> {
        Self::build(
            "openai",
            model,
            base_url.unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            Some(api_key),
        )
    }

    pub fn ollama(model: String, base_url: Option<String>) -> Result<Self, GatewayError> {
        let base_url = base_url
            .map(|url| {
                let url = url.trim_end_matches('/').to_string();
                if url.ends_with("/v1") {
                    url
                } else {
                    format!("{}/v1", url)
                }
            })
            .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
        Self::build("ollama", model, base_url, None)
    }

    pub fn local(
        model: String,
        endpoint: String,
        api_key: Option<String>,
    ) -> Result<Self, GatewayError> {
        Self::build("local", model, endpoint, api_key)
    }

    fn build(
        provider: &'static str,
        model: String,
        base_url: String,
        api_key: Option<String>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: build_provider_http_client()?,
            provider,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }
}

#[async_trait]
impl BackendAdapter for OpenAICompatibleClient {
    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, GatewayError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: &messages,
            options: &options,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .authorized(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let completion: ChatCompletionResponse =
            response.json().await.map_err(invalid_response)?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            GatewayError::backend(BackendErrorKind::InvalidResponse, "No choices in response")
        })?;

        let usage = completion
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            model: completion.model.unwrap_or_else(|| self.model.clone()),
            usage,
            finish_reason: choice.finish_reason,
        })
    }

    fn provider_name(&self) -> &str {
        self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        #[derive(Deserialize)]
        struct ModelsResponse {
            data: Vec<ModelInfo>,
        }
        #[derive(Deserialize)]
        struct ModelInfo {
            id: String,
        }

        let models: ModelsResponse = response.json().await.map_err(invalid_response)?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
}
