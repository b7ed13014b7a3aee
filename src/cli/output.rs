//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::GatewayError;

/// Map a gateway error to the text printed on stderr.
pub fn map_error(e: &GatewayError) -> String {
    match e {
        GatewayError::ConvergenceNotReached { best_effort, .. } => format!(
            "{}\n\nBest-effort response:\n{}\n\n(rerun with --accept-best-effort to accept it)",
            e, best_effort.content
        ),
        _ => e.to_string(),
    }
}

/// Map a gateway error to its JSON body for `--format json`.
pub fn map_error_json(e: &GatewayError) -> String {
    serde_json::to_string_pretty(&e.to_body()).unwrap_or_else(|_| e.to_string())
}

/// Render an error in the format the command asked for.
pub fn render_error(e: &GatewayError, format: &str) -> String {
    if format == "json" {
        map_error_json(e)
    } else {
        map_error(e)
    }
}
