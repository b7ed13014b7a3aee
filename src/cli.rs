//! CLI domain: parse, route, output, and presentation only.
//! No gateway orchestration; single route table dispatches to the gateway.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::{map_error, map_error_json, render_error};
pub use parse::{Cli, Commands, ConfigCommands, ModelCommands, RequirementCommands};
pub use presentation::{
    format_check_json, format_check_text, format_completion_json, format_completion_text,
    format_model_list_json, format_model_list_text, format_model_probe_json,
    format_model_probe_text, format_model_show_json, format_model_show_text,
    format_type_list_json, format_type_list_text, format_validation_json,
    format_validation_text,
};
pub use route::RunContext;
