//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment};

pub const ENV_PREFIX: &str = "REQUIREDAI";

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("convergence.max_iterations", 5_i64)?
        .set_default("convergence.max_consecutive_evaluation_errors", 3_i64)?
        .set_default("convergence.concurrent_evaluation", false)?
        .set_default("logging.output", "stderr")
}

/// Highest-precedence layer: `REQUIREDAI__SECTION__KEY=value`.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
