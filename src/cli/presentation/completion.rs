//! Completion presentation: final answer, requirement summary, prospects.

use crate::engine::EvaluationOutcome;
use crate::gateway::ChatCompletionResponse;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;

pub fn format_completion_text(response: &ChatCompletionResponse, quiet: bool) -> String {
    if quiet {
        return response.content().to_string();
    }

    let mut output = format!("{}\n\n", response.content());
    let summary = &response.requirements;
    if summary.met {
        output.push_str(&format!(
            "{} requirements met after {} revision(s)\n",
            "✓".green(),
            summary.iterations
        ));
    } else {
        output.push_str(&format!(
            "{} requirements NOT met after {} revision(s)\n",
            "✗".yellow(),
            summary.iterations
        ));
        for unmet in &summary.unmet {
            let label = if unmet.name.is_empty() {
                unmet.type_key.as_str()
            } else {
                unmet.name.as_str()
            };
            output.push_str(&format!("  #{} {} ({})\n", unmet.index, label, unmet.type_key));
        }
    }
    output.push_str(&format!(
        "Model: {}  Tokens: {} prompt / {} completion\n",
        response.model, response.usage.prompt_tokens, response.usage.completion_tokens
    ));

    if let Some(prospects) = &response.prospects {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Attempt", "Model", "Evaluations", "Revised for"]);
        for prospect in prospects {
            let evaluations = prospect
                .evaluations
                .iter()
                .map(|record| {
                    let mark = match record.outcome {
                        EvaluationOutcome::Passed => "pass",
                        EvaluationOutcome::Failed => "fail",
                        EvaluationOutcome::Error => "error",
                    };
                    format!("#{} {}: {}", record.index, record.type_key, mark)
                })
                .collect::<Vec<_>>()
                .join("\n");
            let revised_for = prospect
                .revision
                .as_ref()
                .map(|r| format!("#{}", r.requirement_index))
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                prospect.attempt.to_string(),
                prospect.model.clone(),
                evaluations,
                revised_for,
            ]);
        }
        output.push('\n');
        output.push_str(&table.to_string());
        output.push('\n');
    }

    output
}

pub fn format_completion_json(response: &ChatCompletionResponse) -> String {
    serde_json::to_string_pretty(response).unwrap_or_else(|_| "{}".to_string())
}
