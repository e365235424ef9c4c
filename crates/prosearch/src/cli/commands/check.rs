//! Implementation of `prosearch check`.

use std::process::ExitCode;

use prosearch_config::ConfigWarning;
use prosearch_index::{Connector, MemoryRecordStore};

use crate::cli::context::CommandContext;

/// Exit codes for `prosearch check`.
mod exit_codes {
    use std::process::ExitCode;

    /// Configuration is valid with no warnings.
    pub const OK: ExitCode = ExitCode::SUCCESS;
    /// Configuration has warnings but is usable.
    pub const WARNINGS: ExitCode = ExitCode::FAILURE;
}

/// Validates the configuration, the record store and the backend connection.
pub fn run(ctx: &CommandContext) -> ExitCode {
    let config = &ctx.config;

    println!("Checking configuration...");
    println!();

    let Some(path) = &config.config_path else {
        println!("No configuration file found.");
        println!();
        println!("Run 'prosearch init' to create a configuration file.");
        return exit_codes::OK;
    };
    println!("Config file: {}", path.display());

    match MemoryRecordStore::load(&config.indexing.store) {
        Ok(store) => println!(
            "Record store: {} ({} records)",
            config.indexing.store.display(),
            store.len()
        ),
        Err(e) => println!("Record store: {e}"),
    }

    match ctx.provider().connect() {
        Some(connection) => {
            let index = connection.index_name(&config.search.index, config.search.root_id);
            match connection.backend().index_exists(&index) {
                Ok(true) => println!("Backend: reachable, index {index} exists"),
                Ok(false) => println!("Backend: reachable, index {index} not created yet"),
                Err(e) => println!("Backend: {e}"),
            }
        }
        None => println!("Backend: unavailable"),
    }
    println!();

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("No issues found.");
        return exit_codes::OK;
    }

    println!("Warnings ({}):", warnings.len());
    for warning in &warnings {
        println!("  - {warning}");
    }
    println!();
    print_hints(&warnings);

    exit_codes::WARNINGS
}

/// Prints hints for resolving common warnings.
fn print_hints(warnings: &[ConfigWarning]) {
    let mut hints: Vec<&str> = warnings
        .iter()
        .filter_map(|warning| match warning {
            ConfigWarning::NoCredentials | ConfigWarning::LicenseOnly => {
                Some("Add direct or cloud credentials to [credentials] to enable the backend.")
            }
            ConfigWarning::MissingSignature => Some("Set credentials.signature to your tenant id."),
            ConfigWarning::MissingHost => Some("Set credentials.host, e.g. https://localhost."),
            ConfigWarning::IncompleteCloudCredentials => {
                Some("Cloud credentials need cloud_id and api_key.")
            }
            ConfigWarning::CertificateMissing { .. } => {
                Some("Fix credentials.cert or remove it to use the system roots.")
            }
            ConfigWarning::UnknownAnalyzer { .. } => {
                Some("Use one of the listed analyzers for search.analyzer.")
            }
            ConfigWarning::ZeroPageSize | ConfigWarning::ZeroBatchSize => {
                Some("Sizes must be at least 1.")
            }
            ConfigWarning::NoDomain => None,
        })
        .collect();

    hints.sort_unstable();
    hints.dedup();

    if !hints.is_empty() {
        println!("Hints:");
        for hint in hints {
            println!("  - {hint}");
        }
    }
}
