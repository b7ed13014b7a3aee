//! Gateway
//!
//! Turns inbound chat-completion requests into convergence sessions:
//! deserializes requirements through the registry, resolves alias models,
//! and tracks keyed sessions so they can be inspected or stopped.

use crate::backend::{BackendRouter, CompletionOptions, ProviderType};
use crate::config::GatewayConfig;
use crate::engine::{
    ChatCompletionRequest, ConvergenceEngine, ConvergenceReport, ConvergenceStatus,
    SessionSnapshot,
};
use crate::error::GatewayError;
use crate::message::Message;
use crate::requirement::{RequirementRef, RequirementRegistry};
use futures::future::{Abortable, Aborted};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod probe;
pub mod request;
pub mod response;
pub mod tracker;

pub use probe::ModelProbe;
pub use request::InboundRequest;
pub use response::{ChatCompletionResponse, Choice, RequirementsSummary};
pub use tracker::SessionTracker;

/// Virtual model: a target model plus requirements attached to every request.
#[derive(Debug, Clone)]
pub struct AliasModel {
    pub target: String,
    pub requirements: Vec<RequirementRef>,
}

pub struct Gateway {
    registry: Arc<RequirementRegistry>,
    engine: ConvergenceEngine,
    aliases: BTreeMap<String, AliasModel>,
    tracker: SessionTracker,
}

impl Gateway {
    pub fn new(registry: Arc<RequirementRegistry>, engine: ConvergenceEngine) -> Self {
        Self {
            registry,
            engine,
            aliases: BTreeMap::new(),
            tracker: SessionTracker::new(),
        }
    }

    pub fn with_alias(mut self, name: impl Into<String>, alias: AliasModel) -> Self {
        self.aliases.insert(name.into(), alias);
        self
    }

    /// Assemble router, engine and aliases from a validated configuration.
    pub fn from_config(
        config: &GatewayConfig,
        registry: RequirementRegistry,
    ) -> Result<Self, GatewayError> {
        let router = BackendRouter::from_config(&config.models)?;
        let engine = ConvergenceEngine::new(Arc::new(router), config.convergence.clone());
        let mut gateway = Gateway::new(Arc::new(registry), engine);

        for (name, model) in &config.models {
            if model.provider != ProviderType::Alias {
                continue;
            }
            let requirements = gateway
                .registry
                .deserialize_all(&model.requirements)
                .map_err(|e| {
                    GatewayError::ConfigError(format!("Alias model '{}': {}", name, e))
                })?;
            debug!(
                alias = %name,
                target = %model.provider_model,
                requirements = requirements.len(),
                "Registered alias model"
            );
            gateway = gateway.with_alias(
                name.clone(),
                AliasModel {
                    target: model.provider_model.clone(),
                    requirements,
                },
            );
        }

        info!(aliases = gateway.aliases.len(), "Gateway ready");
        Ok(gateway)
    }

    pub fn registry(&self) -> &RequirementRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &ConvergenceEngine {
        &self.engine
    }

    pub fn aliases(&self) -> &BTreeMap<String, AliasModel> {
        &self.aliases
    }

    /// Build the engine request: alias requirements first, then the request's own.
    pub fn prepare(&self, inbound: InboundRequest) -> Result<ChatCompletionRequest, GatewayError> {
        let own = self.registry.deserialize_all(&inbound.requirements)?;
        let (model, requirements) = match self.aliases.get(&inbound.model) {
            Some(alias) => {
                let mut requirements = alias.requirements.clone();
                requirements.extend(own);
                (alias.target.clone(), requirements)
            }
            None => (inbound.model, own),
        };

        Ok(ChatCompletionRequest {
            conversation: inbound.messages,
            default_model: model,
            max_tokens: inbound.max_tokens,
            requirements,
            passthrough_params: inbound.passthrough,
        })
    }

    /// Run a request. Exhaustion comes back as a response flagged
    /// `requirements.met = false`.
    pub async fn run(&self, inbound: InboundRequest) -> Result<ChatCompletionResponse, GatewayError> {
        let model = inbound.model.clone();
        let include_prospects = inbound.include_prospects;
        let report = self.execute(inbound).await?;
        Ok(ChatCompletionResponse::from_report(
            report,
            &model,
            include_prospects,
        ))
    }

    /// Run a request; exhaustion is a `ConvergenceNotReached` error.
    pub async fn complete(
        &self,
        inbound: InboundRequest,
    ) -> Result<ChatCompletionResponse, GatewayError> {
        let model = inbound.model.clone();
        let include_prospects = inbound.include_prospects;
        let report = self.execute(inbound).await?;
        if let ConvergenceStatus::MaxIterations { unmet } = &report.status {
            return Err(GatewayError::ConvergenceNotReached {
                iterations: report.iterations,
                unmet: unmet.clone(),
                best_effort: Box::new(report.response.clone()),
            });
        }
        Ok(ChatCompletionResponse::from_report(
            report,
            &model,
            include_prospects,
        ))
    }

    pub fn status(&self, session_key: &str) -> Option<SessionSnapshot> {
        self.tracker.status(session_key)
    }

    pub fn stop(&self, session_key: &str) -> bool {
        self.tracker.stop(session_key)
    }

    pub fn is_running(&self, session_key: &str) -> bool {
        self.tracker.is_running(session_key)
    }

    /// Send one tiny completion to `model` (aliases resolve to their target).
    /// Failures are reported in the probe, not as errors.
    pub async fn probe(&self, model: &str) -> ModelProbe {
        let routed_to = self
            .aliases
            .get(model)
            .map(|alias| alias.target.clone())
            .unwrap_or_else(|| model.to_string());
        let options = CompletionOptions {
            max_tokens: Some(probe::PROBE_MAX_TOKENS),
            ..CompletionOptions::default()
        };

        let started = Instant::now();
        let result = self
            .engine
            .router()
            .complete(&routed_to, vec![Message::user(probe::PROBE_PROMPT)], &options)
            .await;
        let latency_ms = started.elapsed().as_millis();

        match result {
            Ok(response) => ModelProbe {
                model: model.to_string(),
                routed_to,
                ok: true,
                latency_ms,
                reply: Some(response.message.content),
                error: None,
            },
            Err(e) => {
                warn!(model, error = %e, "Model probe failed");
                ModelProbe {
                    model: model.to_string(),
                    routed_to,
                    ok: false,
                    latency_ms,
                    reply: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn execute(&self, inbound: InboundRequest) -> Result<ConvergenceReport, GatewayError> {
        let session_key = inbound.session_key.clone();
        let request = self.prepare(inbound)?;

        let Some(key) = session_key else {
            return self.engine.run(request).await;
        };

        let (tracked, registration) = self.tracker.track(&key)?;
        let session = self.engine.run_observed(request, &tracked);
        match Abortable::new(session, registration).await {
            Ok(result) => result,
            Err(Aborted) => {
                info!(session_key = %key, "Session cancelled");
                Err(GatewayError::Cancelled)
            }
        }
    }
}
