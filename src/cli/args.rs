//! CLI argument definitions using clap
//!
//! Commands:
//! - querystream serve [--config <path>] [--port <n>]
//! - querystream export --query <sql> [--format ndjson|arrow] [--limit <n>]
//!   [--batch-size <n>] [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::stream::StreamFormat;

/// querystream - stream SQL query results as NDJSON or Arrow IPC
#[derive(Parser, Debug)]
#[command(name = "querystream")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP streaming server
    Serve {
        /// Path to configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on, overriding the configuration
        #[arg(long)]
        port: Option<u16>,
    },

    /// Stream one query to stdout and exit
    Export {
        /// SQL to run
        #[arg(long)]
        query: String,

        /// Output format: ndjson (line) or arrow (columnar)
        #[arg(long, default_value = "ndjson")]
        format: StreamFormat,

        /// Stop after this many rows
        #[arg(long)]
        limit: Option<u64>,

        /// Rows per Arrow record batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Path to configuration file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
