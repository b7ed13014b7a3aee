//! Connectivity probe for one configured model.

use serde::Serialize;

pub(crate) const PROBE_PROMPT: &str = "Reply with the single word: ok";
pub(crate) const PROBE_MAX_TOKENS: u32 = 5;

/// Outcome of one tiny completion against a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelProbe {
    pub model: String,
    /// Concrete model the call went to (differs from `model` for aliases).
    pub routed_to: String,
    pub ok: bool,
    pub latency_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
