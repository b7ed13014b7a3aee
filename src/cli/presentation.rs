//! CLI presentation: text and json formatters per command family.

mod completion;
mod config;
mod models;
mod requirements;

pub use completion::{format_completion_json, format_completion_text};
pub use config::{format_validation_json, format_validation_text};
pub use models::{
    format_model_list_json, format_model_list_text, format_model_probe_json,
    format_model_probe_text, format_model_show_json, format_model_show_text,
};
pub use requirements::{
    format_check_json, format_check_text, format_type_list_json, format_type_list_text,
};
