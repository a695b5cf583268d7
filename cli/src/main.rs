//! mo11y CLI
//!
//! Prints a read-only report of everything in the telemetry store.
//!
//! # Usage
//!
//! ```bash
//! mo11y
//! mo11y report --db ../mo11y/mo11y.duckdb
//! mo11y report --store clickhouse --url http://localhost:8123 --database mo11y
//! mo11y ping
//! ```
//!
//! Exit status is 0 for a report with data, 1 on failure and 2 when every
//! section is empty.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::config::{StoreBackend, StoreConfig};
use shared::report::{run_report, ReportOutcome, EMPTY_DATASET_MESSAGE};
use shared::storage::open_store;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;
/// Exit status when the store holds no telemetry at all.
const EXIT_EMPTY: u8 = 2;

/// mo11y - telemetry store report
#[derive(Parser)]
#[command(name = "mo11y")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store to read: duckdb or clickhouse (overrides MO11Y_STORE)
    #[arg(long, global = true)]
    store: Option<StoreBackend>,

    /// Path to the DuckDB database file (overrides MO11Y_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// ClickHouse URL (overrides MO11Y_DB_URL)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// ClickHouse database name (overrides MO11Y_DB_NAME)
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Query timeout in seconds (overrides MO11Y_QUERY_TIMEOUT_SECS)
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Print every span, event, link, log and metric (default)
    Report,
    /// Check that the store is reachable
    Ping,
}

/// What a successful run produced.
#[derive(Debug)]
enum Completed {
    Report(ReportOutcome),
    Ping,
}

impl Cli {
    fn store_config(&self) -> Result<StoreConfig> {
        let mut config = StoreConfig::from_env().context("Invalid store environment")?;
        if let Some(backend) = self.store {
            config = config.with_backend(backend);
        }
        if let Some(path) = &self.db {
            config = config.with_db_path(path.clone());
        }
        if let Some(url) = &self.url {
            config = config.with_url(url.clone());
        }
        if let Some(database) = &self.database {
            config = config.with_database(database.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.with_query_timeout_secs(secs);
        }
        config
            .validate_config()
            .context("Invalid store configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = run(&cli);

    ExitCode::from(exit_status(&result, &mut std::io::stderr()))
}

fn run(cli: &Cli) -> Result<Completed> {
    let config = cli.store_config()?;
    match config.backend {
        StoreBackend::DuckDb => tracing::info!(
            path = %config.db_path.display(),
            timeout_secs = config.query_timeout_secs,
            "Opening DuckDB store"
        ),
        StoreBackend::ClickHouse => tracing::info!(
            url = %config.url,
            database = %config.database,
            timeout_secs = config.query_timeout_secs,
            "Connecting to ClickHouse store"
        ),
    }
    let store = open_store(&config).context("Failed to open telemetry store")?;

    match cli.command.as_ref().unwrap_or(&Commands::Report) {
        Commands::Report => {
            let mut out = std::io::stdout().lock();
            let outcome = run_report(store.as_ref(), &mut out).context("Report failed")?;
            Ok(Completed::Report(outcome))
        }
        Commands::Ping => {
            store.ping().context("Store is not reachable")?;
            println!("{} store is reachable", config.backend);
            Ok(Completed::Ping)
        }
    }
}

/// Maps a run result to the process exit status, writing the one diagnostic
/// line for an empty dataset or a failure to `stderr`.
fn exit_status(result: &Result<Completed>, stderr: &mut impl Write) -> u8 {
    match result {
        Ok(Completed::Report(outcome)) if outcome.is_empty() => {
            let _ = writeln!(stderr, "{EMPTY_DATASET_MESSAGE}");
            EXIT_EMPTY
        }
        Ok(_) => EXIT_SUCCESS,
        Err(e) => {
            let _ = writeln!(stderr, "Error: {e:#}");
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::report::ReportError;
    use shared::storage::{InMemoryTelemetryStore, Table, Value};

    fn outcome(store: &InMemoryTelemetryStore) -> Result<Completed> {
        let outcome = run_report(store, &mut Vec::new())?;
        Ok(Completed::Report(outcome))
    }

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["mo11y"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.url.is_none());
        assert!(cli.store.is_none());
    }

    #[test]
    fn test_cli_report_command() {
        let cli = Cli::try_parse_from(["mo11y", "report"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Report));
    }

    #[test]
    fn test_cli_ping_command() {
        let cli = Cli::try_parse_from(["mo11y", "ping"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Ping));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mo11y",
            "report",
            "--store",
            "clickhouse",
            "--url",
            "http://db:8123",
            "--database",
            "otel",
            "--timeout",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.store, Some(StoreBackend::ClickHouse));
        assert_eq!(cli.url.as_deref(), Some("http://db:8123"));
        assert_eq!(cli.database.as_deref(), Some("otel"));
        assert_eq!(cli.timeout, Some(5));
    }

    #[test]
    fn test_cli_db_path() {
        let cli = Cli::try_parse_from(["mo11y", "--db", "/tmp/telemetry.duckdb"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/telemetry.duckdb")));

        let config = cli.store_config().unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/telemetry.duckdb"));
    }

    #[test]
    fn test_cli_rejects_unknown_store() {
        assert!(Cli::try_parse_from(["mo11y", "--store", "sqlite"]).is_err());
    }

    #[test]
    fn test_cli_rejects_bad_timeout() {
        assert!(Cli::try_parse_from(["mo11y", "--timeout", "soon"]).is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["mo11y", "ingest"]).is_err());
    }

    #[test]
    fn test_store_config_rejects_zero_timeout() {
        let cli = Cli::try_parse_from(["mo11y", "--timeout", "0"]).unwrap();
        assert!(cli.store_config().is_err());
    }

    #[test]
    fn test_store_config_rejects_bad_url() {
        let cli = Cli::try_parse_from(["mo11y", "--url", "not a url"]).unwrap();
        assert!(cli.store_config().is_err());
    }

    #[test]
    fn test_exit_status_success_with_data() {
        let store = InMemoryTelemetryStore::new();
        store
            .insert(
                Table::Spans,
                [
                    ("trace_id", Value::from("abcdef1234567890")),
                    ("span_id", Value::from("1122334455667788")),
                    ("name", Value::from("op")),
                    ("start_time", Value::from("2024-01-15T10:30:00Z")),
                    ("duration_ns", Value::from(1_500_000_i64)),
                ],
            )
            .unwrap();
        let mut stderr = Vec::new();

        assert_eq!(exit_status(&outcome(&store), &mut stderr), 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn test_exit_status_empty_dataset() {
        let store = InMemoryTelemetryStore::new();
        let mut stderr = Vec::new();

        assert_eq!(exit_status(&outcome(&store), &mut stderr), 2);

        let stderr = String::from_utf8(stderr).unwrap();
        assert_eq!(stderr.lines().count(), 1);
        assert_eq!(stderr.trim_end(), EMPTY_DATASET_MESSAGE);
    }

    #[test]
    fn test_exit_status_fatal_error() {
        let error = ReportError::Output(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "closed",
        ));
        let result: Result<Completed> = Err(anyhow::Error::new(error).context("Report failed"));
        let mut stderr = Vec::new();

        assert_eq!(exit_status(&result, &mut stderr), 1);

        let stderr = String::from_utf8(stderr).unwrap();
        assert!(stderr.starts_with("Error: Report failed: Failed to write report"));
        assert_eq!(stderr.lines().count(), 1);
    }

    #[test]
    fn test_exit_status_ping() {
        let mut stderr = Vec::new();

        assert_eq!(exit_status(&Ok(Completed::Ping), &mut stderr), 0);
    }
}
