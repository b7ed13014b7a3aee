//! Config validation presentation.

use crate::config::ValidationError;
use owo_colors::OwoColorize;
use serde_json::json;

pub fn format_validation_text(errors: &[ValidationError], models: usize) -> String {
    if errors.is_empty() {
        return format!(
            "{} Configuration is valid ({} model(s))",
            "✓".green(),
            models
        );
    }
    let mut output = format!("{} Configuration has {} error(s):\n", "✗".red(), errors.len());
    for error in errors {
        output.push_str(&format!("  - {}\n", error));
    }
    output
}

pub fn format_validation_json(errors: &[ValidationError], models: usize) -> String {
    let out = json!({
        "valid": errors.is_empty(),
        "models": models,
        "errors": errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}
