//! Backend Router
//!
//! Maps model identifiers to adapters. Built once at startup from the model
//! table and shared read-only by every session.

use crate::backend::fallback::{FallbackBackend, FallbackStep};
use crate::backend::{
    BackendAdapter, CompletionOptions, CompletionResponse, ModelConfig, ProviderFactory,
    ProviderType,
};
use crate::error::GatewayError;
use crate::message::{Message, Role};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One routing-table entry: the adapter plus the model's default options.
#[derive(Clone)]
pub struct Route {
    pub adapter: Arc<dyn BackendAdapter>,
    pub default_options: CompletionOptions,
}

/// Routing table from model identifier to adapter
#[derive(Clone, Default)]
pub struct BackendRouter {
    routes: BTreeMap<String, Route>,
}

impl BackendRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the route for `model`.
    pub fn with_route(
        mut self,
        model: impl Into<String>,
        adapter: Arc<dyn BackendAdapter>,
        default_options: CompletionOptions,
    ) -> Self {
        self.routes.insert(
            model.into(),
            Route {
                adapter,
                default_options,
            },
        );
        self
    }

    /// Build the table from configured models.
    ///
    /// Concrete providers are created first so fallback chains can point at
    /// them. Alias entries are not routes; the gateway resolves them before
    /// a request reaches the engine.
    pub fn from_config(models: &BTreeMap<String, ModelConfig>) -> Result<Self, GatewayError> {
        let mut router = BackendRouter::new();

        for (model_id, config) in models {
            if config.provider.is_composite() {
                continue;
            }
            let adapter = ProviderFactory::create_adapter(model_id, config)?;
            debug!(
                model = %model_id,
                provider = adapter.provider_name(),
                upstream = adapter.model_name(),
                "Registered backend route"
            );
            router = router.with_route(model_id.clone(), adapter, config.default_options.clone());
        }

        for (model_id, config) in models {
            if config.provider != ProviderType::Fallback {
                continue;
            }
            let mut steps = Vec::with_capacity(config.fallback.len());
            for target in &config.fallback {
                let route = router.routes.get(&target.model).ok_or_else(|| {
                    GatewayError::ConfigError(format!(
                        "Fallback model '{}' targets '{}', which is not a concrete model",
                        model_id, target.model
                    ))
                })?;
                steps.push(FallbackStep {
                    target: target.clone(),
                    adapter: route.adapter.clone(),
                    default_options: route.default_options.clone(),
                });
            }
            let adapter = Arc::new(FallbackBackend::new(model_id.clone(), steps)?);
            router = router.with_route(model_id.clone(), adapter, config.default_options.clone());
        }

        info!(routes = router.routes.len(), "Backend router ready");
        Ok(router)
    }

    /// Look up the route serving `model`.
    pub fn route(&self, model: &str) -> Result<&Route, GatewayError> {
        self.routes
            .get(model)
            .ok_or_else(|| GatewayError::UnknownBackend(model.to_string()))
    }

    pub fn adapter(&self, model: &str) -> Result<Arc<dyn BackendAdapter>, GatewayError> {
        Ok(self.route(model)?.adapter.clone())
    }

    pub fn contains(&self, model: &str) -> bool {
        self.routes.contains_key(model)
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// One upstream call through the route for `model`.
    ///
    /// Request options are layered over the model's defaults and stripped of
    /// requirement fields and adapter-owned fields. The reply always comes
    /// back as an assistant message.
    pub async fn complete(
        &self,
        model: &str,
        messages: Vec<Message>,
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, GatewayError> {
        let route = self.route(model)?;
        let mut options = options.merged_over(&route.default_options);
        options.strip_gateway_fields();

        debug!(
            model,
            provider = route.adapter.provider_name(),
            messages = messages.len(),
            "Backend call"
        );
        let mut response = route.adapter.complete(messages, options).await?;
        response.message.role = Role::Assistant;
        debug!(
            model,
            completion_tokens = response.usage.completion_tokens,
            finish_reason = response.finish_reason.as_deref().unwrap_or(""),
            "Backend reply"
        );
        Ok(response)
    }
}
