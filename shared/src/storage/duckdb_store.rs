//! DuckDB-backed telemetry store.
//!
//! The database file is opened with `AccessMode::ReadOnly`. Each query runs
//! on its own reader thread over a cloned connection and hands rows across a
//! bounded channel, so a section never holds more than a small buffer of rows.
//! The query timeout bounds each wait for the next row, not the lifetime of
//! the stream.

use super::table::{RawRow, Table, Value};
use super::telemetry_store::{RowStream, StoreError, TelemetryStore};
use crate::config::StoreConfig;
use crate::models::Attributes;
use duckdb::{AccessMode, Config, Connection};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Mutex;
use std::thread::JoinHandle;
use std::time::Duration;

/// Rows buffered between the reader thread and the report.
const ROW_BUFFER: usize = 64;

/// How a projected column is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Text,
    Int,
    Float,
    Attributes,
}

impl Cell {
    fn of(column: &str) -> Self {
        match column {
            "duration_ns" | "type" => Self::Int,
            "value" => Self::Float,
            "resource_attrs" => Self::Attributes,
            _ => Self::Text,
        }
    }

    fn select(self, column: &str) -> String {
        match self {
            Self::Text => format!("CAST(\"{column}\" AS VARCHAR)"),
            Self::Int => format!("CAST(\"{column}\" AS BIGINT)"),
            Self::Float => format!("CAST(\"{column}\" AS DOUBLE)"),
            Self::Attributes => format!("CAST(to_json(\"{column}\") AS VARCHAR)"),
        }
    }
}

/// DuckDB-backed telemetry store implementation.
pub struct DuckDbTelemetryStore {
    conn: Mutex<Connection>,
    query_timeout: Duration,
}

impl DuckDbTelemetryStore {
    /// Opens the database at `path` read-only.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the file does not exist or cannot
    /// be opened.
    pub fn open(path: impl AsRef<Path>, query_timeout: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let config = Config::default()
            .access_mode(AccessMode::ReadOnly)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = Connection::open_with_flags(path, config)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;

        tracing::debug!(path = %path.display(), "Opened DuckDB store read-only");
        Ok(Self {
            conn: Mutex::new(conn),
            query_timeout,
        })
    }

    /// Opens the database named by `config.db_path`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the file cannot be opened.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::open(&config.db_path, config.query_timeout())
    }

    /// The bound on each wait for the next row.
    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    fn connection(&self) -> Result<Connection, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockError)?;
        conn.try_clone()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl TelemetryStore for DuckDbTelemetryStore {
    fn query(&self, table: Table) -> Result<RowStream<'_>, StoreError> {
        let conn = self.connection()?;
        let (sender, receiver) = mpsc::sync_channel(ROW_BUFFER);

        let worker = std::thread::Builder::new()
            .name(format!("duckdb-{table}"))
            .spawn(move || {
                if let Err(e) = read_table(&conn, table, &sender) {
                    // The receiver may already be gone.
                    let _ = sender.send(Err(StoreError::Query {
                        table,
                        message: e.to_string(),
                    }));
                }
            })
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Box::new(ChannelRows {
            table,
            timeout: self.query_timeout,
            receiver: Some(receiver),
            worker: Some(worker),
            done: false,
        }))
    }

    fn ping(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockError)?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
            .map(|_| ())
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

/// Builds the projection query for a table. Every column is cast to one of
/// four shapes so rows read the same whatever the physical column types are.
fn select_sql(table: Table) -> String {
    let columns = table
        .columns()
        .iter()
        .map(|column| Cell::of(column).select(column))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("SELECT {columns} FROM {table}");
    if let Some(order) = table.order_by() {
        let _ = write!(sql, " ORDER BY \"{order}\"");
    }
    sql
}

/// Runs on the reader thread. Stops early once the receiver hangs up.
fn read_table(
    conn: &Connection,
    table: Table,
    sender: &SyncSender<Result<RawRow, StoreError>>,
) -> duckdb::Result<()> {
    let mut statement = conn.prepare(&select_sql(table))?;
    let mut rows = statement.query([])?;

    while let Some(row) = rows.next()? {
        let raw = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| read_cell(row, idx, Cell::of(column)))
            .collect::<duckdb::Result<RawRow>>()?;

        if sender.send(Ok(raw)).is_err() {
            break;
        }
    }
    Ok(())
}

fn read_cell(row: &duckdb::Row<'_>, idx: usize, cell: Cell) -> duckdb::Result<Value> {
    Ok(match cell {
        Cell::Text => row.get::<_, Option<String>>(idx)?.into(),
        Cell::Int => row.get::<_, Option<i64>>(idx)?.into(),
        Cell::Float => row.get::<_, Option<f64>>(idx)?.into(),
        Cell::Attributes => attributes(row.get::<_, Option<String>>(idx)?.as_deref()),
    })
}

/// Parses a JSON rendering of an attribute column.
///
/// Accepts an object, a `[{"key": .., "value": ..}]` entry list, or a JSON
/// string holding either. Anything else is passed through as text for the
/// decoder to reject.
fn attributes(json: Option<&str>) -> Value {
    let Some(text) = json else {
        return Value::Null;
    };

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Null) => Value::Null,
        Ok(serde_json::Value::Object(map)) => Value::Map(map.into_iter().collect()),
        Ok(serde_json::Value::Array(entries)) => entries
            .into_iter()
            .map(|entry| match entry {
                serde_json::Value::Object(mut kv) => match (kv.remove("key"), kv.remove("value")) {
                    (Some(serde_json::Value::String(k)), Some(v)) => Some((k, v)),
                    _ => None,
                },
                _ => None,
            })
            .collect::<Option<Attributes>>()
            .map_or_else(|| Value::Text(text.to_string()), Value::Map),
        Ok(serde_json::Value::String(inner)) if inner != text => attributes(Some(&inner)),
        _ => Value::Text(text.to_string()),
    }
}

/// Lazy row iterator fed by one reader thread.
struct ChannelRows {
    table: Table,
    timeout: Duration,
    receiver: Option<Receiver<Result<RawRow, StoreError>>>,
    worker: Option<JoinHandle<()>>,
    done: bool,
}

impl ChannelRows {
    fn finish(&mut self) -> Option<Result<RawRow, StoreError>> {
        self.done = true;
        self.receiver = None;
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(()) => None,
            Err(_) => Some(Err(StoreError::Query {
                table: self.table,
                message: "reader thread panicked".to_string(),
            })),
        }
    }
}

impl Iterator for ChannelRows {
    type Item = Result<RawRow, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let received = self.receiver.as_ref()?.recv_timeout(self.timeout);
        match received {
            Ok(Ok(row)) => Some(Ok(row)),
            Ok(Err(e)) => {
                let _ = self.finish();
                Some(Err(e))
            }
            Err(RecvTimeoutError::Disconnected) => self.finish(),
            Err(RecvTimeoutError::Timeout) => {
                // The reader is stuck inside DuckDB; leave it detached.
                self.done = true;
                self.receiver = None;
                self.worker = None;
                Some(Err(StoreError::Timeout {
                    table: self.table,
                    after: self.timeout,
                }))
            }
        }
    }
}

impl Drop for ChannelRows {
    fn drop(&mut self) {
        // Hanging up first lets a reader blocked on a full buffer exit.
        self.receiver = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(table = %self.table, "DuckDB reader thread panicked");
            }
        }
    }
}
