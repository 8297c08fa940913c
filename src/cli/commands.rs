//! CLI command implementations
//!
//! `serve` runs the HTTP server; `export` streams one query to stdout through
//! the same driver and validation the server uses.

use std::path::Path;

use tokio::io::AsyncWrite;

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use crate::http_server::{HttpServer, StreamRequest, StreamState};
use crate::observability::{log_event, log_event_with_fields, Event, Logger};
use crate::source::{RowSource, SqliteRowSource};
use crate::stream::{StreamDriver, StreamFormat, StreamOutcome, StreamSummary, WriterSink};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, port } => serve(config.as_deref(), port),
        Command::Export {
            query,
            format,
            limit,
            batch_size,
            config,
        } => {
            let request = StreamRequest {
                query,
                format,
                limit,
                batch_size,
            };
            export(config.as_deref(), request)
        }
    }
}

/// Start the HTTP server and block until it shuts down.
pub fn serve(config_path: Option<&Path>, port: Option<u16>) -> CliResult<()> {
    log_event(Event::BootStart);

    let mut config = Config::resolve(config_path)?;
    if let Some(port) = port {
        config.http.port = port;
    }
    apply_log_level(&config);
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("database", config.database_path.as_str()),
            ("schema_policy", config.schema_policy.as_str()),
        ],
    );

    let source = open_source(&config);
    let state = StreamState::with_settings(source, config.stream_settings());
    let server = HttpServer::with_config(config.http.clone(), state);

    let rt = runtime()?;
    rt.block_on(async {
        server.start().await.map_err(|e| {
            log_event_with_fields(Event::ServerFailed, &[("reason", e.to_string().as_str())]);
            CliError::serve_failed(format!("HTTP server failed: {}", e))
        })
    })
}

/// Stream one query to stdout.
pub fn export(config_path: Option<&Path>, request: StreamRequest) -> CliResult<()> {
    let config = Config::resolve(config_path)?;
    apply_log_level(&config);

    let rt = runtime()?;
    let summary = rt.block_on(async {
        let (summary, _stdout) = export_to(&config, &request, tokio::io::stdout()).await?;
        Ok::<_, CliError>(summary)
    })?;

    if summary.outcome == StreamOutcome::Cancelled {
        return Err(CliError::io_error("stdout closed before the stream finished"));
    }
    Ok(())
}

/// Stream `request` against the configured database into `writer`.
///
/// Returns the writer so callers can inspect what was written.
pub async fn export_to<W>(
    config: &Config,
    request: &StreamRequest,
    writer: W,
) -> CliResult<(StreamSummary, W)>
where
    W: AsyncWrite + Unpin + Send,
{
    let options = request
        .options(&config.stream_settings())
        .map_err(|e| CliError::invalid_argument(e.to_string()))?;

    let source = open_source(config);
    let cursor = source.open(&request.query, options.limit).await?;

    let mut sink = WriterSink::new(writer);
    let summary = StreamDriver::new(options).drive(cursor, &mut sink).await?;
    Ok((summary, sink.into_inner()))
}

fn open_source(config: &Config) -> SqliteRowSource {
    SqliteRowSource::new(
        config.database_path(),
        config.max_connections,
        config.fetch_size,
    )
}

fn apply_log_level(config: &Config) {
    if let Some(severity) = config.severity() {
        Logger::set_min_severity(severity);
    }
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))
}

/// Parse `--format` values outside clap (used by tests and embedders)
pub fn parse_format(value: &str) -> CliResult<StreamFormat> {
    value.parse().map_err(CliError::invalid_argument)
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn create_database(dir: &TempDir) -> Config {
        let path = dir.path().join("people.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE people (id INTEGER, name TEXT);
             INSERT INTO people VALUES (1, 'ada'), (2, 'grace'), (3, 'edsger');",
        )
        .unwrap();

        Config::default().with_database_override(Some(path.to_string_lossy().to_string()))
    }

    fn request(query: &str, limit: Option<u64>) -> StreamRequest {
        StreamRequest {
            query: query.to_string(),
            format: StreamFormat::Line,
            limit,
            batch_size: None,
        }
    }

    #[tokio::test]
    async fn test_export_writes_ndjson() {
        let dir = TempDir::new().unwrap();
        let config = create_database(&dir);

        let (summary, out) = export_to(
            &config,
            &request("SELECT id, name FROM people ORDER BY id", None),
            Vec::new(),
        )
        .await
        .unwrap();

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.outcome, StreamOutcome::Completed);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "{\"id\":1,\"name\":\"ada\"}\n{\"id\":2,\"name\":\"grace\"}\n{\"id\":3,\"name\":\"edsger\"}\n"
        );
    }

    #[tokio::test]
    async fn test_export_respects_limit() {
        let dir = TempDir::new().unwrap();
        let config = create_database(&dir);

        let (summary, out) = export_to(&config, &request("SELECT * FROM people", Some(1)), Vec::new())
            .await
            .unwrap();

        assert_eq!(summary.rows, 1);
        assert_eq!(out.iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[tokio::test]
    async fn test_export_invalid_sql() {
        let dir = TempDir::new().unwrap();
        let config = create_database(&dir);

        let err = export_to(&config, &request("SELEC nothing", None), Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::QueryFailed);
    }

    #[tokio::test]
    async fn test_export_rejects_empty_query() {
        let dir = TempDir::new().unwrap();
        let config = create_database(&dir);

        let err = export_to(&config, &request("  ", None), Vec::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::InvalidArgument);
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(parse_format("arrow").unwrap(), StreamFormat::Columnar);
        assert_eq!(
            parse_format("xml").unwrap_err().code(),
            &CliErrorCode::InvalidArgument
        );
    }
}
