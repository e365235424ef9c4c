//! prosearch: index CMS records into a search backend and query them.
//!
//! The binary reads `.prosearch.toml`, indexes records from a local record store into the
//! configured backend, and serves searches and autocomplete lookups from the command line.

#![warn(missing_docs)]

mod cli;

use std::{io, process::ExitCode};

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{args::Cli, commands, context::CommandContext};

/// Installs the stderr log subscriber. `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "prosearch=info,prosearch_index=info",
        _ => "prosearch=debug,prosearch_index=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let ctx = if cli.command.needs_config() {
        CommandContext::load(cli.config.as_deref())
    } else {
        CommandContext::load_cwd_only(cli.config.as_deref())
    };
    match ctx {
        Ok(ctx) => {
            tracing::debug!(
                config = ?ctx.config.config_path,
                cwd = %ctx.cwd.display(),
                "loaded context"
            );
            commands::run(cli.command, &ctx)
        }
        Err(code) => code,
    }
}
