//! CLI parse: clap types for RequiredAI.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// RequiredAI CLI - chat completions that meet declared requirements
#[derive(Parser)]
#[command(name = "requiredai")]
#[command(about = "Chat-completion gateway that revises answers until they meet their requirements")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (where requiredai.toml is looked up)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Print only the essential result
    #[arg(long, short, default_value = "false", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one chat-completion request through the gateway
    Complete {
        /// Request JSON file, or "-" for stdin
        #[arg(long)]
        request: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Return the last draft when requirements stay unmet instead of failing
        #[arg(long)]
        accept_best_effort: bool,
    },
    /// Inspect configured models
    Models {
        #[command(subcommand)]
        command: ModelCommands,
    },
    /// Requirement types and documents
    Requirements {
        #[command(subcommand)]
        command: RequirementCommands,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ModelCommands {
    /// List configured models
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show one model's configuration
    Show {
        /// Model identifier
        name: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Send one tiny completion to check connectivity
    Test {
        /// Model identifier
        name: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum RequirementCommands {
    /// List registered requirement types
    Types {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Validate a requirement document (object or array) and print it canonically
    Check {
        /// Requirement JSON file, or "-" for stdin
        #[arg(long)]
        file: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate the loaded configuration
    Validate {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

impl Commands {
    /// Output format requested by the command.
    pub fn format(&self) -> &str {
        match self {
            Commands::Complete { format, .. } => format,
            Commands::Models { command } => match command {
                ModelCommands::List { format }
                | ModelCommands::Show { format, .. }
                | ModelCommands::Test { format, .. } => format,
            },
            Commands::Requirements { command } => match command {
                RequirementCommands::Types { format } | RequirementCommands::Check { format, .. } => {
                    format
                }
            },
            Commands::Config { command } => match command {
                ConfigCommands::Validate { format } => format,
            },
        }
    }
}
