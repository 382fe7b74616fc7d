//! CLI parse: clap types for Mailweave. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mailweave CLI - synthetic corporate email thread generation
#[derive(Parser)]
#[command(name = "mailweave")]
#[command(about = "Generate branching corporate email threads from storyline plans")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long)]
    pub verbose: bool,

    /// Disable all logging
    #[arg(long)]
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
    /// Print the slot plan of every thread without requesting any content
    Plan {
        /// Generation input JSON (characters and storylines)
        #[arg(long)]
        input: PathBuf,
        /// Override the configured run seed
        #[arg(long)]
        seed: Option<u64>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Generate every thread and write one file per message
    Generate {
        /// Generation input JSON (characters and storylines)
        #[arg(long)]
        input: PathBuf,
        /// Output directory for generated threads
        #[arg(long)]
        output: PathBuf,
        /// Override the configured run seed
        #[arg(long)]
        seed: Option<u64>,
        /// Threads generated concurrently
        #[arg(long)]
        parallel: Option<usize>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List the topic archetype catalog
    Topics {
        /// Catalog JSON file (default: configured path or the built-in catalog)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}
