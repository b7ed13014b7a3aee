//! Fallback chains: try a list of models in order, with per-target retries.

use crate::backend::{BackendAdapter, CompletionOptions, CompletionResponse, FallbackTarget};
use crate::error::{BackendErrorKind, GatewayError};
use crate::message::Message;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A resolved fallback step.
pub struct FallbackStep {
    pub target: FallbackTarget,
    pub adapter: Arc<dyn BackendAdapter>,
    pub default_options: CompletionOptions,
}

/// Composite adapter over other configured models
///
/// Starts from the step that last succeeded so a healthy backend keeps
/// serving until it fails.
pub struct FallbackBackend {
    name: String,
    steps: Vec<FallbackStep>,
    preferred: AtomicUsize,
}

impl FallbackBackend {
    pub fn new(name: String, steps: Vec<FallbackStep>) -> Result<Self, GatewayError> {
        if steps.is_empty() {
            return Err(GatewayError::ConfigError(format!(
                "Fallback model '{}' has no targets",
                name
            )));
        }
        Ok(Self {
            name,
            steps,
            preferred: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl BackendAdapter for FallbackBackend {
    async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> Result<CompletionResponse, GatewayError> {
        let start = self.preferred.load(Ordering::Relaxed) % self.steps.len();
        let mut failures = Vec::new();

        for offset in 0..self.steps.len() {
            let index = (start + offset) % self.steps.len();
            let step = &self.steps[index];
            let step_options = options.merged_over(&step.default_options);

            for attempt in 0..step.target.max_retries {
                debug!(
                    fallback = %self.name,
                    target = %step.target.model,
                    attempt,
                    "Fallback attempt"
                );
                match step
                    .adapter
                    .complete(messages.clone(), step_options.clone())
                    .await
                {
                    Ok(response) => {
                        self.preferred.store(index, Ordering::Relaxed);
                        return Ok(response);
                    }
                    Err(e) => {
                        warn!(
                            fallback = %self.name,
                            target = %step.target.model,
                            attempt,
                            error = %e,
                            "Fallback target failed"
                        );
                        failures.push(format!("{}: {}", step.target.model, e));
                        if attempt + 1 < step.target.max_retries && step.target.retry_delay_ms > 0 {
                            tokio::time::sleep(Duration::from_millis(step.target.retry_delay_ms))
                                .await;
                        }
                    }
                }
            }
        }

        Err(GatewayError::backend(
            BackendErrorKind::RequestFailed,
            format!(
                "All fallback targets of '{}' failed: {}",
                self.name,
                failures.join("; ")
            ),
        ))
    }

    fn provider_name(&self) -> &str {
        "fallback"
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn estimate_tokens(&self, text: &str) -> usize {
        let index = self.preferred.load(Ordering::Relaxed) % self.steps.len();
        self.steps[index].adapter.estimate_tokens(text)
    }
}
