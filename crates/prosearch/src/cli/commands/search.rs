//! Implementation of `prosearch search`.

use std::process::ExitCode;

use prosearch_index::{SearchQuery, SearchResults};

use crate::cli::{
    args::SearchCommand,
    context::CommandContext,
    output::{print_json, render_search},
};

/// Searches the configured index and prints the hits.
pub fn run(ctx: &CommandContext, cmd: &SearchCommand) -> ExitCode {
    let query = SearchQuery::new(cmd.query.join(" ")).with_types(cmd.types.clone());

    let results = match ctx.connection() {
        Some(connection) => match ctx.searcher(connection).search(&query, cmd.fuzzy) {
            Ok(results) => results,
            Err(e) => {
                eprintln!("error: search failed: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => SearchResults::default(),
    };

    if cmd.json {
        return print_json(&results);
    }
    render_search(&results);
    ExitCode::SUCCESS
}
