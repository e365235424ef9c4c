//! Implementation of `prosearch config`.

use std::process::ExitCode;

use crate::cli::context::CommandContext;

/// Shows effective configuration settings.
pub fn run(ctx: &CommandContext) -> ExitCode {
    match &ctx.config.config_path {
        Some(path) => println!("# {}", path.display()),
        None => println!("# defaults (no configuration file found)"),
    }
    print!("{}", ctx.config.settings_to_toml());
    ExitCode::SUCCESS
}
