//! Workspace config file source: requiredai.toml and requiredai.{env}.toml

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join("requiredai.toml")
}

/// Add workspace config files to builder.
/// Precedence: requiredai.toml (base) then requiredai.{REQUIREDAI_ENV}.toml.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let env_name = std::env::var("REQUIREDAI_ENV").unwrap_or_else(|_| "development".to_string());

    let mut builder = builder;

    let base_config_path = workspace_config_path(workspace_root);
    if base_config_path.exists() {
        debug!(config_path = %base_config_path.display(), "Loading workspace configuration");
        builder = builder.add_source(File::from(base_config_path).required(false));
    }

    let env_config_path = workspace_root.join(format!("requiredai.{}.toml", env_name));
    if env_config_path.exists() {
        debug!(config_path = %env_config_path.display(), "Loading environment configuration");
        builder = builder.add_source(File::from(env_config_path).required(false));
    }

    Ok(builder)
}
