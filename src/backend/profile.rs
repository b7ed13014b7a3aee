//! Model profiles: one routing-table entry per model identifier.

use crate::backend::CompletionOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Provider kind behind a model identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "local")]
    LocalCustom,
    /// Ordered list of other models tried in turn.
    #[serde(rename = "fallback")]
    Fallback,
    /// Virtual model: another model plus requirements attached to every request.
    #[serde(rename = "alias")]
    Alias,
}

impl ProviderType {
    pub fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("OPENAI_API_KEY"),
            ProviderType::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderType::Gemini => Some("GEMINI_API_KEY"),
            _ => None,
        }
    }

    pub fn requires_api_key(self) -> bool {
        matches!(
            self,
            ProviderType::OpenAI | ProviderType::Anthropic | ProviderType::Gemini
        )
    }

    pub fn is_composite(self) -> bool {
        matches!(self, ProviderType::Fallback | ProviderType::Alias)
    }
}

pub fn provider_type_slug(provider_type: ProviderType) -> &'static str {
    match provider_type {
        ProviderType::OpenAI => "openai",
        ProviderType::Anthropic => "anthropic",
        ProviderType::Gemini => "gemini",
        ProviderType::Ollama => "ollama",
        ProviderType::LocalCustom => "local",
        ProviderType::Fallback => "fallback",
        ProviderType::Alias => "alias",
    }
}

/// One step of a fallback chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackTarget {
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub retry_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    1
}

/// Model configuration entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: ProviderType,

    /// Model name on the provider side; for aliases, the target model identifier.
    #[serde(default)]
    pub provider_model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub default_options: CompletionOptions,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<FallbackTarget>,

    /// Serialized requirements attached to an alias.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Value>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderType::OpenAI,
            provider_model: String::new(),
            api_key: None,
            api_key_env: None,
            endpoint: None,
            default_options: CompletionOptions::default(),
            fallback: Vec::new(),
            requirements: Vec::new(),
        }
    }
}

impl ModelConfig {
    /// Explicit key, then the configured variable, then the provider's usual variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env
            .as_deref()
            .or_else(|| self.provider.default_api_key_env())
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }

    /// Shape checks that need no other entry.
    pub fn validate(&self) -> Result<(), String> {
        match self.provider {
            ProviderType::Fallback => {
                if self.fallback.is_empty() {
                    return Err("Fallback model must list at least one target".to_string());
                }
                for target in &self.fallback {
                    if target.model.trim().is_empty() {
                        return Err("Fallback target model cannot be empty".to_string());
                    }
                    if target.max_retries == 0 {
                        return Err(format!(
                            "Fallback target '{}' must allow at least one attempt",
                            target.model
                        ));
                    }
                }
            }
            _ => {
                if self.provider_model.trim().is_empty() {
                    return Err("provider_model cannot be empty".to_string());
                }
            }
        }

        if self.provider != ProviderType::Alias && !self.requirements.is_empty() {
            return Err("Only alias models can carry requirements".to_string());
        }

        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(format!("Invalid endpoint URL: {}", endpoint));
            }
        }

        Ok(())
    }
}
