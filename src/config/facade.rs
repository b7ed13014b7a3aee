//! Config loader: assembles the layered sources into a [`GatewayConfig`].

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::GatewayConfig;
use config::{ConfigError, File};
use std::path::{Path, PathBuf};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest → highest): defaults, global file, workspace
    /// `requiredai.toml`, workspace `requiredai.{REQUIREDAI_ENV}.toml`,
    /// `REQUIREDAI__*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<GatewayConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(merge_policy::environment())
            .build()?
            .try_deserialize()
    }

    /// Load one explicit file (plus environment overrides).
    pub fn load_from_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true))
            .add_source(merge_policy::environment())
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only.
    pub fn default() -> GatewayConfig {
        GatewayConfig::default()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
        workspace_file::workspace_config_path(workspace_root)
    }
}
