//! Clap argument definitions for the `prosearch` CLI.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Top-level CLI options.
#[derive(Parser)]
#[command(name = "prosearch")]
#[command(about = "Index CMS content into a search backend and query it")]
pub struct Cli {
    /// Use this configuration file instead of discovering one
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments for `prosearch init`.
#[derive(Args, Debug, Clone)]
pub struct InitCommand {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `prosearch index`.
#[derive(Args, Debug, Clone)]
pub struct IndexCommand {
    /// Index only this record
    #[arg(long)]
    pub id: Option<u64>,
}

/// Arguments for `prosearch delete`.
#[derive(Args, Debug, Clone)]
pub struct DeleteCommand {
    /// Record to delete
    pub id: u64,
}

/// Arguments for `prosearch search`.
#[derive(Args, Debug, Clone)]
pub struct SearchCommand {
    /// Search terms
    #[arg(required = true)]
    pub query: Vec<String>,

    /// Only return documents of this type (can be specified multiple times)
    #[arg(short = 't', long = "type")]
    pub types: Vec<String>,

    /// Start with fuzzy matching
    #[arg(long)]
    pub fuzzy: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `prosearch complete`.
#[derive(Args, Debug, Clone)]
pub struct CompleteCommand {
    /// Typed prefix
    pub prefix: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Supported `prosearch` subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a .prosearch.toml in the current directory
    Init(InitCommand),

    /// Validate configuration and diagnose issues
    Check,

    /// Show the effective configuration
    Config,

    /// Index the next batch of records
    Index(IndexCommand),

    /// Delete a record and its indexed document
    Delete(DeleteCommand),

    /// Search the index
    Search(SearchCommand),

    /// Propose completions for a prefix
    Complete(CompleteCommand),
}

impl Commands {
    /// Whether the command reads the configuration file.
    pub fn needs_config(&self) -> bool {
        !matches!(self, Self::Init(_))
    }
}
