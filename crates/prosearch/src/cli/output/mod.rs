//! Rendering and JSON serialization for CLI output.

use std::process::ExitCode;

use comfy_table::{Cell, Table, presets::UTF8_FULL_CONDENSED};
use prosearch_index::{Completions, SearchResult, SearchResults};
use serde::Serialize;

/// Highlight fields shown in tables, in order of preference.
const SNIPPET_FIELDS: [&str; 2] = ["text", "document"];

/// Prints a value as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: failed to serialize JSON: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Removes highlight markup from a fragment.
pub fn strip_tags(fragment: &str) -> String {
    fragment.replace("<strong>", "").replace("</strong>", "")
}

/// The first highlighted fragment of a hit, without markup.
fn snippet(hit: &SearchResult) -> String {
    SNIPPET_FIELDS
        .iter()
        .find_map(|field| hit.highlight.get(*field).and_then(|f| f.first()))
        .map(|fragment| strip_tags(fragment))
        .unwrap_or_default()
}

/// Prints corrections, if there are any.
fn print_did_you_mean(suggestions: &[String]) {
    if !suggestions.is_empty() {
        println!("Did you mean: {}?", suggestions.join(", "));
    }
}

/// Renders search hits as a table.
pub fn render_search(results: &SearchResults) {
    if results.hits.is_empty() {
        println!("No results.");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec!["ID", "Score", "Types", "Snippet"]);
        for hit in &results.hits {
            table.add_row(vec![
                Cell::new(hit.id),
                Cell::new(format!("{:.2}", hit.score)),
                Cell::new(hit.types.join(", ")),
                Cell::new(snippet(hit)),
            ]);
        }
        println!("{table}");
    }
    print_did_you_mean(&results.did_you_mean);
}

/// Renders completions, one per line.
pub fn render_completions(completions: &Completions) {
    if completions.hits.is_empty() {
        println!("No completions.");
    }
    for completion in &completions.hits {
        println!("{}", completion.term);
    }
    print_did_you_mean(&completions.did_you_mean);
}
