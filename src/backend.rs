//! Backend Abstraction
//!
//! Unified interface for the upstream model providers the gateway forwards to
//! (OpenAI-compatible endpoints, Anthropic, Gemini, Ollama, custom local servers).
//! Every adapter normalizes its provider's reply into one canonical assistant
//! message so the convergence engine never sees provider-specific shapes.

use crate::error::{BackendErrorKind, GatewayError};
use crate::message::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

pub mod anthropic;
pub mod fallback;
pub mod gemini;
pub mod openai;
pub mod profile;
pub mod router;

pub use profile::{provider_type_slug, FallbackTarget, ModelConfig, ProviderType};
pub use router::{BackendRouter, Route};

/// Request fields that belong to the gateway and must never reach a provider.
const REQUIREMENT_FIELD_PREFIX: &str = "requirement";

/// Wire fields each adapter sets itself; a client copy would duplicate them.
const ADAPTER_OWNED_FIELDS: &[&str] = &["model", "messages", "stream"];

/// Completion options
///
/// Typed fields cover the parameters every adapter understands; anything else
/// the client sent is carried in `extra` and forwarded verbatim where the
/// provider's wire format allows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CompletionOptions {
    /// Build options from a client's passthrough parameters.
    pub fn from_params(
        max_tokens: Option<u32>,
        params: Map<String, Value>,
    ) -> Result<Self, GatewayError> {
        let mut options: CompletionOptions = serde_json::from_value(Value::Object(params))
            .map_err(|e| GatewayError::InvalidRequest(format!("Invalid parameters: {}", e)))?;
        if max_tokens.is_some() {
            options.max_tokens = max_tokens;
        }
        Ok(options)
    }

    /// Layer `self` over `defaults`: every key set here wins.
    pub fn merged_over(&self, defaults: &CompletionOptions) -> CompletionOptions {
        let mut extra = defaults.extra.clone();
        for (key, value) in &self.extra {
            extra.insert(key.clone(), value.clone());
        }
        CompletionOptions {
            temperature: self.temperature.or(defaults.temperature),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            top_p: self.top_p.or(defaults.top_p),
            frequency_penalty: self.frequency_penalty.or(defaults.frequency_penalty),
            presence_penalty: self.presence_penalty.or(defaults.presence_penalty),
            stop: self.stop.clone().or_else(|| defaults.stop.clone()),
            extra,
        }
    }

    /// Remove requirement fields and the fields adapters write themselves.
    pub fn strip_gateway_fields(&mut self) {
        self.extra.retain(|key, _| {
            !key.to_ascii_lowercase().starts_with(REQUIREMENT_FIELD_PREFIX)
                && !ADAPTER_OWNED_FIELDS.contains(&key.as_str())
        });
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Normalized completion: always a single assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: Message,
    pub model: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
}

impl CompletionResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content),
            model: model.into(),
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        }
    }
}

/// Backend adapter trait
///
/// One adapter serves one configured model. `complete` performs exactly one
/// upstream call; retries, if any, belong to composite adapters such as
/// [`fallback::FallbackBackend`].
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Generate a completion from a list of messages
    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, GatewayError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the upstream model name
    fn model_name(&self) -> &str;

    /// List available models from the provider
    async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        Err(GatewayError::backend(
            BackendErrorKind::RequestFailed,
            format!("{} does not provide a models list endpoint", self.provider_name()),
        ))
    }

    /// Rough token count used for judge prompt budgeting.
    fn estimate_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Character-count heuristic: about 4.3 characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f64 / 4.3) as usize
}

// Helper function to map transport errors to GatewayError
pub(crate) fn map_http_error(error: reqwest::Error) -> GatewayError {
    if let Some(status) = error.status() {
        status_error(status.as_u16(), &error.to_string())
    } else if error.is_timeout() {
        GatewayError::backend(
            BackendErrorKind::Transport,
            format!("Request timeout: {}", error),
        )
    } else if error.is_connect() {
        GatewayError::backend(
            BackendErrorKind::Transport,
            format!("Connection error: {}", error),
        )
    } else {
        GatewayError::backend(BackendErrorKind::Transport, format!("HTTP error: {}", error))
    }
}

pub(crate) fn status_error(status: u16, detail: &str) -> GatewayError {
    match status {
        401 | 403 => GatewayError::backend(
            BackendErrorKind::Auth,
            format!("Authentication failed: {}", detail),
        ),
        429 => GatewayError::backend(
            BackendErrorKind::RateLimit,
            format!("Rate limit exceeded: {}", detail),
        ),
        404 => GatewayError::backend(
            BackendErrorKind::ModelNotFound,
            format!("Model not found: {}", detail),
        ),
        _ => GatewayError::backend(
            BackendErrorKind::RequestFailed,
            format!("Request failed with status {}: {}", status, detail),
        ),
    }
}

/// Turn a non-success response into an error, keeping the provider's body text.
pub(crate) async fn error_for_status(response: reqwest::Response) -> GatewayError {
    let status = response.status().as_u16();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    status_error(status, &error_text)
}

pub(crate) fn invalid_response(detail: impl std::fmt::Display) -> GatewayError {
    GatewayError::backend(
        BackendErrorKind::InvalidResponse,
        format!("Failed to parse response: {}", detail),
    )
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROVIDER_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) fn build_provider_http_client() -> Result<Client, GatewayError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(PROVIDER_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| GatewayError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Provider factory for creating adapters from model configuration
pub struct ProviderFactory;

impl ProviderFactory {
    /// Build the adapter for a concrete (non-composite) model entry.
    pub fn create_adapter(
        model_id: &str,
        config: &ModelConfig,
    ) -> Result<Arc<dyn BackendAdapter>, GatewayError> {
        let model = config.provider_model.clone();
        let api_key = config.resolve_api_key();
        let endpoint = config.endpoint.clone();
        let missing_key = || {
            GatewayError::ConfigError(format!(
                "No API key for model '{}' (set api_key, api_key_env or {})",
                model_id,
                config
                    .provider
                    .default_api_key_env()
                    .unwrap_or("the provider's key variable")
            ))
        };

        match config.provider {
            ProviderType::OpenAI => {
                let key = api_key.ok_or_else(missing_key)?;
                Ok(Arc::new(openai::OpenAICompatibleClient::openai(
                    model, key, endpoint,
                )?))
            }
            ProviderType::Anthropic => {
                let key = api_key.ok_or_else(missing_key)?;
                Ok(Arc::new(anthropic::AnthropicClient::new(model, key, endpoint)?))
            }
            ProviderType::Gemini => {
                let key = api_key.ok_or_else(missing_key)?;
                Ok(Arc::new(gemini::GeminiClient::new(model, key, endpoint)?))
            }
            ProviderType::Ollama => Ok(Arc::new(openai::OpenAICompatibleClient::ollama(
                model, endpoint,
            )?)),
            ProviderType::LocalCustom => {
                let endpoint = endpoint.ok_or_else(|| {
                    GatewayError::ConfigError(format!(
                        "Model '{}' uses a local provider but has no endpoint",
                        model_id
                    ))
                })?;
                Ok(Arc::new(openai::OpenAICompatibleClient::local(
                    model, endpoint, api_key,
                )?))
            }
            ProviderType::Fallback | ProviderType::Alias => Err(GatewayError::ConfigError(
                format!(
                    "Model '{}' is a {} entry and has no adapter of its own",
                    model_id,
                    provider_type_slug(config.provider)
                ),
            )),
        }
    }
}
