//! File sources in precedence order: global, then workspace.

pub mod global_file;
pub mod workspace_file;
