//! CLI module for querystream
//!
//! Provides command-line interface for:
//! - serve: Run the HTTP streaming server
//! - export: Stream one query to stdout

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command};
pub use commands::{export, export_to, parse_format, run, run_command, serve};
pub use config::{Config, DATABASE_ENV};
pub use errors::{CliError, CliErrorCode, CliResult};
