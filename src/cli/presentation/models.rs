//! Model command presentation: list, show, test text/json.

use crate::backend::{provider_type_slug, ModelConfig, ProviderType};
use crate::gateway::ModelProbe;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;
use std::collections::BTreeMap;

fn api_key_status(model: &ModelConfig) -> &'static str {
    if !model.provider.requires_api_key() {
        "not_required"
    } else if model.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
        "set_from_config"
    } else if model.resolve_api_key().is_some() {
        "set_from_env"
    } else {
        "not_set"
    }
}

/// Provider-side model, fallback chain, or alias target.
fn target_summary(model: &ModelConfig) -> String {
    match model.provider {
        ProviderType::Fallback => model
            .fallback
            .iter()
            .map(|t| t.model.as_str())
            .collect::<Vec<_>>()
            .join(" → "),
        ProviderType::Alias => format!(
            "{} (+{} requirement(s))",
            model.provider_model,
            model.requirements.len()
        ),
        _ => model.provider_model.clone(),
    }
}

pub fn format_model_list_text(models: &BTreeMap<String, ModelConfig>) -> String {
    if models.is_empty() {
        return "No models configured.\n\nAdd a [models.<name>] table to requiredai.toml."
            .to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Model", "Provider", "Target", "Endpoint"]);
    for (name, model) in models {
        table.add_row(vec![
            name.clone(),
            provider_type_slug(model.provider).to_string(),
            target_summary(model),
            model
                .endpoint
                .clone()
                .unwrap_or_else(|| "(default endpoint)".to_string()),
        ]);
    }
    format!("{}\n\nTotal: {} model(s)", table, models.len())
}

pub fn format_model_list_json(models: &BTreeMap<String, ModelConfig>) -> String {
    let list: Vec<_> = models
        .iter()
        .map(|(name, model)| {
            json!({
                "model": name,
                "provider": provider_type_slug(model.provider),
                "target": target_summary(model),
                "endpoint": model.endpoint,
            })
        })
        .collect();
    let out = json!({ "models": list, "total": models.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_model_show_text(name: &str, model: &ModelConfig) -> String {
    let mut output = format!("Model: {}\n", name);
    output.push_str(&format!("Provider: {}\n", provider_type_slug(model.provider)));
    match model.provider {
        ProviderType::Fallback => {
            output.push_str("Fallback chain:\n");
            for target in &model.fallback {
                output.push_str(&format!(
                    "  {} (attempts: {}, delay: {}ms)\n",
                    target.model, target.max_retries, target.retry_delay_ms
                ));
            }
        }
        ProviderType::Alias => {
            output.push_str(&format!("Target: {}\n", model.provider_model));
            output.push_str(&format!("Requirements: {}\n", model.requirements.len()));
        }
        _ => {
            output.push_str(&format!("Provider model: {}\n", model.provider_model));
            output.push_str(&format!(
                "Endpoint: {}\n",
                model.endpoint.as_deref().unwrap_or("(default endpoint)")
            ));
            output.push_str(&format!("API Key: {}\n", api_key_status(model)));
        }
    }

    let options = &model.default_options;
    output.push_str("\nDefault Completion Options:\n");
    if let Some(temp) = options.temperature {
        output.push_str(&format!("  temperature: {}\n", temp));
    }
    if let Some(max_tokens) = options.max_tokens {
        output.push_str(&format!("  max_tokens: {}\n", max_tokens));
    }
    if let Some(top_p) = options.top_p {
        output.push_str(&format!("  top_p: {}\n", top_p));
    }
    if let Some(ref stop) = options.stop {
        output.push_str(&format!("  stop: {:?}\n", stop));
    }
    for (key, value) in &options.extra {
        output.push_str(&format!("  {}: {}\n", key, value));
    }
    output
}

pub fn format_model_show_json(name: &str, model: &ModelConfig) -> String {
    let mut body = serde_json::to_value(model).unwrap_or_else(|_| json!({}));
    if let Some(map) = body.as_object_mut() {
        // never echo secrets
        map.remove("api_key");
        map.insert("model".to_string(), json!(name));
        map.insert("api_key_status".to_string(), json!(api_key_status(model)));
    }
    serde_json::to_string_pretty(&body).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_model_probe_text(probe: &ModelProbe) -> String {
    let mut output = if probe.routed_to == probe.model {
        format!("Testing model: {}\n\n", probe.model)
    } else {
        format!("Testing model: {} (via {})\n\n", probe.model, probe.routed_to)
    };
    if probe.ok {
        output.push_str(&format!(
            "{} Connectivity: OK ({}ms)\n",
            "✓".green(),
            probe.latency_ms
        ));
        if let Some(reply) = &probe.reply {
            output.push_str(&format!("Reply: {}\n", reply.trim()));
        }
    } else {
        output.push_str(&format!("{} Connectivity: FAILED\n", "✗".red()));
        if let Some(error) = &probe.error {
            output.push_str(&format!("Error: {}\n", error));
        }
    }
    output
}

pub fn format_model_probe_json(probe: &ModelProbe) -> String {
    serde_json::to_string_pretty(probe).unwrap_or_else(|_| "{}".to_string())
}
