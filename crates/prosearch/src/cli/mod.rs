//! CLI support for the `prosearch` binary.

pub mod args;
pub mod commands;
pub mod context;
pub mod output;
