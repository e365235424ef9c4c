//! Command implementations and dispatch.

pub mod check;
pub mod complete;
pub mod config;
pub mod delete;
pub mod index;
pub mod init;
pub mod search;

use std::process::ExitCode;

use super::{args::Commands, context::CommandContext};

/// Dispatches to the selected subcommand.
pub fn run(command: Commands, ctx: &CommandContext) -> ExitCode {
    match command {
        Commands::Init(cmd) => init::run(ctx, &cmd),
        Commands::Check => check::run(ctx),
        Commands::Config => config::run(ctx),
        Commands::Index(cmd) => index::run(ctx, &cmd),
        Commands::Delete(cmd) => delete::run(ctx, &cmd),
        Commands::Search(cmd) => search::run(ctx, &cmd),
        Commands::Complete(cmd) => complete::run(ctx, &cmd),
    }
}
