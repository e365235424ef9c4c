//! Implementation of `prosearch delete`.

use std::process::ExitCode;

use prosearch_index::DeleteOutcome;

use crate::cli::{
    args::DeleteCommand,
    context::{CommandContext, note_unavailable},
};

/// Deletes a record, its annotations and its indexed document.
pub fn run(ctx: &CommandContext, cmd: &DeleteCommand) -> ExitCode {
    let mut indexer = match ctx.indexer() {
        Ok(indexer) => indexer,
        Err(code) => return code,
    };

    match indexer.delete(cmd.id) {
        Ok(DeleteOutcome::Missing) => {
            eprintln!("error: record {} not found", cmd.id);
            ExitCode::FAILURE
        }
        Ok(DeleteOutcome::Unavailable) => {
            note_unavailable();
            eprintln!("Record {} was kept so it can be deleted later.", cmd.id);
            ExitCode::SUCCESS
        }
        Ok(DeleteOutcome::Deleted { remote }) => {
            if let Err(code) = ctx.save_store(indexer.store()) {
                return code;
            }
            if remote {
                println!("Deleted record {} and its indexed document", cmd.id);
            } else {
                println!("Deleted record {} (it was not indexed)", cmd.id);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: delete failed: {e}");
            ExitCode::FAILURE
        }
    }
}
