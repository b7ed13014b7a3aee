//! Shared test utilities for integration tests
//!
//! A scripted backend that records every conversation it receives, so tests
//! can assert exactly what the engine sent upstream.

use async_trait::async_trait;
use parking_lot::Mutex;
use requiredai::backend::{
    BackendAdapter, BackendRouter, CompletionOptions, CompletionResponse, TokenUsage,
};
use requiredai::error::{BackendErrorKind, GatewayError};
use requiredai::message::Message;
use std::sync::Arc;
use std::time::Duration;

type Responder = Box<dyn Fn(usize, &[Message]) -> Result<String, GatewayError> + Send + Sync>;

pub struct ScriptedBackend {
    name: String,
    responder: Responder,
    delay: Option<Duration>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    /// Replies in order; the last reply repeats once the script runs out.
    pub fn script(name: &str, replies: &[&str]) -> Self {
        let replies: Vec<String> = replies.iter().map(|r| r.to_string()).collect();
        Self::with_responder(name, move |index, _| {
            replies
                .get(index)
                .or_else(|| replies.last())
                .cloned()
                .ok_or_else(|| GatewayError::backend(BackendErrorKind::RequestFailed, "empty script"))
        })
    }

    /// Reply computed from the call index and the conversation received.
    pub fn with_responder(
        name: &str,
        responder: impl Fn(usize, &[Message]) -> Result<String, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            responder: Box::new(responder),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always fails with the given kind.
    pub fn failing(name: &str, kind: BackendErrorKind) -> Self {
        Self::with_responder(name, move |_, _| Err(GatewayError::backend(kind, "scripted failure")))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl BackendAdapter for ScriptedBackend {
    async fn complete(
        &self,
        messages: Vec<Message>,
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, GatewayError> {
        let index = {
            let mut calls = self.calls.lock();
            calls.push(messages.clone());
            calls.len() - 1
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let content = (self.responder)(index, &messages)?;
        let mut response = CompletionResponse::new(content, self.name.clone());
        response.usage = TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        Ok(response)
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// Router with one scripted backend per `(model, backend)` pair.
pub fn router(backends: &[(&str, Arc<ScriptedBackend>)]) -> BackendRouter {
    backends
        .iter()
        .fold(BackendRouter::new(), |router, (model, backend)| {
            router.with_route(*model, backend.clone(), CompletionOptions::default())
        })
}

/// Whether a conversation is a judge call rather than a generation or revision.
pub fn is_judge_call(messages: &[Message]) -> bool {
    messages
        .last()
        .map(|m| m.content.contains("Text to evaluate:"))
        .unwrap_or(false)
}
