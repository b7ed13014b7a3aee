//! Requirement command presentation.

use crate::requirement::{label, RequirementRef};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde_json::{json, Value};

pub fn format_type_list_text(type_keys: &[&str]) -> String {
    let mut output = String::from("Registered requirement types:\n");
    for key in type_keys {
        output.push_str(&format!("  {}\n", key));
    }
    output
}

pub fn format_type_list_json(type_keys: &[&str]) -> String {
    serde_json::to_string_pretty(&json!({ "types": type_keys }))
        .unwrap_or_else(|_| "{}".to_string())
}

/// Requirements in evaluation order with what a reviser would be told.
pub fn format_check_text(requirements: &[RequirementRef]) -> String {
    if requirements.is_empty() {
        return "No requirements.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Type", "Name", "Revision model", "Explanation"]);
    for (index, requirement) in requirements.iter().enumerate() {
        table.add_row(vec![
            index.to_string(),
            requirement.type_key().to_string(),
            label(requirement.as_ref()).to_string(),
            requirement.model_override().unwrap_or("(default)").to_string(),
            requirement.explain(),
        ]);
    }
    format!("{}\n\n{} requirement(s) OK", table, requirements.len())
}

pub fn format_check_json(canonical: &[Value]) -> String {
    serde_json::to_string_pretty(canonical).unwrap_or_else(|_| "[]".to_string())
}
