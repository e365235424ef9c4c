//! Implementation of `prosearch index`.

use std::process::ExitCode;

use prosearch_index::IndexError;

use crate::cli::{
    args::IndexCommand,
    context::{CommandContext, note_unavailable},
};

/// Indexes the next batch of records, or a single record, and saves updated timestamps.
pub fn run(ctx: &CommandContext, cmd: &IndexCommand) -> ExitCode {
    let mut indexer = match ctx.indexer() {
        Ok(indexer) => indexer,
        Err(code) => return code,
    };

    let stats = match indexer.index_all(cmd.id) {
        Ok(stats) => stats,
        Err(IndexError::Unavailable) => {
            note_unavailable();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: indexing failed: {e}");
            // Records stamped before the failure stay stamped.
            let _ = ctx.save_store(indexer.store());
            return ExitCode::FAILURE;
        }
    };

    if let Err(code) = ctx.save_store(indexer.store()) {
        return code;
    }

    for index in &stats.created_indices {
        println!("Created index {index}");
    }
    println!(
        "Indexed {} of {} selected records",
        stats.indexed, stats.selected
    );
    for (id, message) in &stats.errors {
        eprintln!("error: record {id}: {message}");
    }

    if stats.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
