//! Inbound chat-completion request.

use crate::error::GatewayError;
use crate::message::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Chat-completion request as clients send it
///
/// Mirrors common chat-completion APIs with a `requirements` list added. Any
/// field not named here is passed through to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundRequest {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Value>,
    /// Key under which the session can be queried or stopped while it runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    /// Attach every prospect and its evaluations to the response.
    #[serde(default, skip_serializing_if = "is_false")]
    pub include_prospects: bool,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

impl InboundRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            max_tokens: None,
            messages,
            requirements: Vec::new(),
            session_key: None,
            include_prospects: false,
            passthrough: Map::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(text)
            .map_err(|e| GatewayError::InvalidRequest(format!("Invalid request body: {}", e)))
    }
}
