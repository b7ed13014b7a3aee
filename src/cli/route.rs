//! CLI route: single route table and run context. Dispatches to the gateway and presentation.

use crate::config::{ConfigLoader, GatewayConfig, ValidationError};
use crate::error::GatewayError;
use crate::gateway::{Gateway, InboundRequest};
use crate::requirement::RequirementRegistry;
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

use crate::cli::parse::{Commands, ConfigCommands, ModelCommands, RequirementCommands};
use crate::cli::presentation;

/// Runtime context for CLI execution: loaded config, registry, and the async runtime.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config_path: Option<PathBuf>,
    config: GatewayConfig,
    runtime: tokio::runtime::Runtime,
    quiet: bool,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, GatewayError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| GatewayError::ConfigError(format!("Failed to start runtime: {}", e)))?;

        Ok(Self {
            workspace_root,
            config_path,
            config,
            runtime,
            quiet: false,
        })
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, GatewayError> {
        let started = Instant::now();
        let result = match command {
            Commands::Complete {
                request,
                format,
                accept_best_effort,
            } => self.handle_complete(request, format, *accept_best_effort),
            Commands::Models { command } => self.handle_model_command(command),
            Commands::Requirements { command } => self.handle_requirement_command(command),
            Commands::Config { command } => self.handle_config_command(command),
        };
        debug!(
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    /// Validated config plus built-in requirement types, assembled into a gateway.
    fn gateway(&self) -> Result<Gateway, GatewayError> {
        if let Err(errors) = self.config.validate() {
            return Err(GatewayError::ConfigError(GatewayConfig::describe_errors(
                &errors,
            )));
        }
        Gateway::from_config(&self.config, RequirementRegistry::with_builtins())
    }

    fn handle_complete(
        &self,
        source: &str,
        format: &str,
        accept_best_effort: bool,
    ) -> Result<String, GatewayError> {
        let body = read_input(source)?;
        let request = InboundRequest::from_json(&body)?;
        let gateway = self.gateway()?;
        info!(
            model = %request.model,
            requirements = request.requirements.len(),
            "Running completion"
        );

        let response = if accept_best_effort {
            self.runtime.block_on(gateway.run(request))?
        } else {
            self.runtime.block_on(gateway.complete(request))?
        };

        if format == "json" {
            Ok(presentation::format_completion_json(&response))
        } else {
            Ok(presentation::format_completion_text(&response, self.quiet))
        }
    }

    fn handle_model_command(&self, command: &ModelCommands) -> Result<String, GatewayError> {
        match command {
            ModelCommands::List { format } => {
                if format == "json" {
                    Ok(presentation::format_model_list_json(&self.config.models))
                } else {
                    Ok(presentation::format_model_list_text(&self.config.models))
                }
            }
            ModelCommands::Show { name, format } => {
                let model = self
                    .config
                    .models
                    .get(name)
                    .ok_or_else(|| GatewayError::UnknownBackend(name.clone()))?;
                if format == "json" {
                    Ok(presentation::format_model_show_json(name, model))
                } else {
                    Ok(presentation::format_model_show_text(name, model))
                }
            }
            ModelCommands::Test { name, format } => {
                if !self.config.models.contains_key(name) {
                    return Err(GatewayError::UnknownBackend(name.clone()));
                }
                let gateway = self.gateway()?;
                let probe = self.runtime.block_on(gateway.probe(name));
                if format == "json" {
                    Ok(presentation::format_model_probe_json(&probe))
                } else {
                    Ok(presentation::format_model_probe_text(&probe))
                }
            }
        }
    }

    fn handle_requirement_command(
        &self,
        command: &RequirementCommands,
    ) -> Result<String, GatewayError> {
        let registry = RequirementRegistry::with_builtins();
        match command {
            RequirementCommands::Types { format } => {
                let keys: Vec<&str> = registry.type_keys().collect();
                if format == "json" {
                    Ok(presentation::format_type_list_json(&keys))
                } else {
                    Ok(presentation::format_type_list_text(&keys))
                }
            }
            RequirementCommands::Check { file, format } => {
                let body = read_input(file)?;
                let docs = match serde_json::from_str::<Value>(&body)? {
                    Value::Array(items) => items,
                    single => vec![single],
                };
                let requirements = registry.deserialize_all(&docs)?;
                if format == "json" {
                    let canonical = registry.serialize_all(&requirements)?;
                    Ok(presentation::format_check_json(&canonical))
                } else {
                    Ok(presentation::format_check_text(&requirements))
                }
            }
        }
    }

    fn handle_config_command(&self, command: &ConfigCommands) -> Result<String, GatewayError> {
        match command {
            ConfigCommands::Validate { format } => {
                let mut errors: Vec<ValidationError> = match self.config.validate() {
                    Ok(()) => Vec::new(),
                    Err(errors) => errors,
                };
                errors.extend(
                    self.config
                        .validate_requirements(&RequirementRegistry::with_builtins()),
                );
                debug!(
                    workspace = %self.workspace_root.display(),
                    config = ?self.config_path,
                    errors = errors.len(),
                    "Validated configuration"
                );

                let models = self.config.models.len();
                let rendered = if format == "json" {
                    presentation::format_validation_json(&errors, models)
                } else {
                    presentation::format_validation_text(&errors, models)
                };
                if errors.is_empty() {
                    Ok(rendered)
                } else {
                    Err(GatewayError::ConfigError(rendered))
                }
            }
        }
    }
}

/// Read a file path, or stdin for "-".
fn read_input(source: &str) -> Result<String, GatewayError> {
    if source == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .map_err(|e| GatewayError::InvalidRequest(format!("Failed to read stdin: {}", e)))?;
        return Ok(body);
    }
    std::fs::read_to_string(source)
        .map_err(|e| GatewayError::InvalidRequest(format!("Failed to read {}: {}", source, e)))
}
