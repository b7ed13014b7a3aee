//! Configuration System
//!
//! Layered TOML configuration for the gateway: the model routing table, the
//! convergence bounds and judge grammar, and logging. The core consumes a
//! validated [`GatewayConfig`]; only this module touches files and the
//! environment.

use crate::backend::{ModelConfig, ProviderType};
use crate::engine::ConvergenceConfig;
use crate::logging::LoggingConfig;
use crate::requirement::RequirementRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Routing table: model identifier → provider entry
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,

    #[serde(default)]
    pub convergence: ConvergenceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Model(String, String),
    Convergence(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Model(name, msg) => write!(f, "Model '{}': {}", name, msg),
            ValidationError::Convergence(msg) => write!(f, "Convergence: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl GatewayConfig {
    /// Validate the entire configuration, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (name, model) in &self.models {
            if name.trim().is_empty() {
                errors.push(ValidationError::Model(
                    name.clone(),
                    "Model identifier cannot be empty".to_string(),
                ));
            }
            if let Err(e) = model.validate() {
                errors.push(ValidationError::Model(name.clone(), e));
                continue;
            }
            match model.provider {
                ProviderType::Fallback => {
                    for target in &model.fallback {
                        match self.models.get(&target.model) {
                            None => errors.push(ValidationError::Model(
                                name.clone(),
                                format!("Fallback target '{}' is not configured", target.model),
                            )),
                            Some(entry) if entry.provider.is_composite() => {
                                errors.push(ValidationError::Model(
                                    name.clone(),
                                    format!(
                                        "Fallback target '{}' must be a concrete model",
                                        target.model
                                    ),
                                ))
                            }
                            Some(_) => {}
                        }
                    }
                }
                ProviderType::Alias => match self.models.get(&model.provider_model) {
                    None => errors.push(ValidationError::Model(
                        name.clone(),
                        format!("Alias target '{}' is not configured", model.provider_model),
                    )),
                    Some(entry) if entry.provider == ProviderType::Alias => {
                        errors.push(ValidationError::Model(
                            name.clone(),
                            format!("Alias target '{}' is itself an alias", model.provider_model),
                        ))
                    }
                    Some(_) => {}
                },
                _ => {}
            }
        }

        for e in self.convergence.validate() {
            errors.push(ValidationError::Convergence(e));
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Check that every alias requirement deserializes with `registry`.
    pub fn validate_requirements(&self, registry: &RequirementRegistry) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for (name, model) in &self.models {
            for (index, doc) in model.requirements.iter().enumerate() {
                if let Err(e) = registry.deserialize(doc) {
                    errors.push(ValidationError::Model(
                        name.clone(),
                        format!("Requirement #{}: {}", index, e),
                    ));
                }
            }
        }
        errors
    }

    /// Every error, one per line, as the CLI prints it.
    pub fn describe_errors(errors: &[ValidationError]) -> String {
        errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
