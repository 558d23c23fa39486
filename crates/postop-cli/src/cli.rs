//! CLI argument parsing and command definitions.

use crate::config::CONFIG_ENV;
use clap::{Parser, Subcommand};

// ============================================================================
// CLI argument types
// ============================================================================

/// Ask questions about post-surgery care guides.
#[derive(Parser, Debug)]
#[command(name = "postop", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = CONFIG_ENV)]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer one question, with and without retrieved context.
    Ask {
        /// The question; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Read questions from stdin, one per line.
    Chat,

    /// Build or refresh the vector index.
    Index {
        /// Rebuild even if a persisted index exists.
        #[arg(short, long)]
        force: bool,

        /// Check index freshness without rebuilding.
        #[arg(long)]
        check: bool,
    },

    /// Print version information.
    Version,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Get a configuration value by dotted key.
    Get {
        /// Dotted key (e.g., "retrieval.top_k").
        key: String,
    },

    /// Set a configuration value by dotted key.
    Set {
        /// Dotted key (e.g., "retrieval.top_k").
        key: String,

        /// Value to set.
        value: String,
    },

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },

    /// Export configuration as environment variables.
    Export {
        /// Format as Docker --env flags.
        #[arg(long)]
        docker_env: bool,
    },
}

impl Command {
    /// Whether the command needs an index and model clients.
    pub fn needs_pipeline(&self) -> bool {
        matches!(self, Command::Ask { .. } | Command::Chat)
    }
}

// ============================================================================
// Tests
// ============================================================================
