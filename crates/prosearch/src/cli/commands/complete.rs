//! Implementation of `prosearch complete`.

use std::process::ExitCode;

use prosearch_index::Completions;

use crate::cli::{
    args::CompleteCommand,
    context::CommandContext,
    output::{print_json, render_completions},
};

/// Proposes completions for a typed prefix.
pub fn run(ctx: &CommandContext, cmd: &CompleteCommand) -> ExitCode {
    let completions = match ctx.connection() {
        Some(connection) => match ctx.searcher(connection).autocomplete(&cmd.prefix) {
            Ok(completions) => completions,
            Err(e) => {
                eprintln!("error: autocomplete failed: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Completions::default(),
    };

    if cmd.json {
        return print_json(&completions);
    }
    render_completions(&completions);
    ExitCode::SUCCESS
}
