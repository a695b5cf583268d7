//! `ClickHouse`-backed telemetry store.
//!
//! Rows are pulled lazily through a `RowCursor`, one round trip at a time.
//! The query timeout bounds each round trip, so time the caller spends
//! between pulls never counts against it. The client always carries
//! `readonly=1`.

use super::table::{RawRow, Table, Value};
use super::telemetry_store::{RowStream, StoreError, TelemetryStore};
use crate::config::StoreConfig;
use crate::models::Attributes;
use chrono::{DateTime, SecondsFormat};
use clickhouse::query::RowCursor;
use clickhouse::{Client, Row};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Default bound on one store round trip.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// `ClickHouse`-backed telemetry store implementation.
///
/// Time columns are stored as Int64 nanoseconds since the epoch and are
/// rendered as RFC 3339 text when converted into a `RawRow`.
#[derive(Clone)]
pub struct ClickHouseTelemetryStore {
    client: Arc<Client>,
    query_timeout: Duration,
}

impl ClickHouseTelemetryStore {
    /// Creates a store over an existing client.
    ///
    /// The caller is responsible for the client being read-only; prefer
    /// [`ClickHouseTelemetryStore::from_config`].
    #[must_use]
    pub fn new(client: Arc<Client>, query_timeout: Duration) -> Self {
        Self {
            client,
            query_timeout,
        }
    }

    /// Creates a read-only store from configuration.
    #[must_use]
    pub fn from_config(config: &StoreConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password)
            .with_option("readonly", "1");

        Self::new(Arc::new(client), config.query_timeout())
    }

    /// The bound applied to each round trip.
    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Helper to execute async operations synchronously.
    fn block_on<F, T>(future: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let handle = Handle::try_current().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(StoreError::Unavailable(
                "ClickHouse store requires a multi-threaded Tokio runtime".to_string(),
            ));
        }
        tokio::task::block_in_place(|| handle.block_on(future))
    }
}

impl TelemetryStore for ClickHouseTelemetryStore {
    fn query(&self, table: Table) -> Result<RowStream<'_>, StoreError> {
        let sql = select_sql(table);
        tracing::debug!(%table, %sql, "Issuing ClickHouse query");

        let query = self.client.query(&sql);
        let timeout = self.query_timeout;

        macro_rules! rows {
            ($row:ty) => {
                Box::new(CursorRows::<$row> {
                    table,
                    cursor: query
                        .fetch::<$row>()
                        .map_err(|e| store_error(table, &e))?,
                    timeout,
                    done: false,
                }) as RowStream<'_>
            };
        }

        Ok(match table {
            Table::Spans => rows!(SpanRow),
            Table::SpanEvents => rows!(SpanEventRow),
            Table::SpanLinks => rows!(SpanLinkRow),
            Table::Logs => rows!(LogRow),
            Table::Metrics => rows!(MetricRow),
        })
    }

    fn ping(&self) -> Result<(), StoreError> {
        let client = Arc::clone(&self.client);
        let timeout = self.query_timeout;
        Self::block_on(async move {
            match tokio::time::timeout(timeout, client.query("SELECT 1").fetch_one::<u8>()).await
            {
                Ok(Ok(_)) => Ok(()),
                Ok(Err(e)) => Err(StoreError::Unavailable(e.to_string())),
                Err(_) => Err(StoreError::Unavailable(format!(
                    "ping timed out after {timeout:?}"
                ))),
            }
        })
    }
}

/// Builds the projection query for a table.
fn select_sql(table: Table) -> String {
    let columns = table
        .columns()
        .iter()
        .map(|column| match *column {
            "type" => "type AS metric_type",
            // Read as Nullable whether or not the column is declared so.
            "value" => "toNullable(value) AS value",
            "histogram_payload" => "toNullable(histogram_payload) AS histogram_payload",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("SELECT {columns} FROM {table}");
    if let Some(order) = table.order_by() {
        let _ = write!(sql, " ORDER BY {order}");
    }
    sql
}

fn store_error(table: Table, error: &clickhouse::error::Error) -> StoreError {
    match error {
        clickhouse::error::Error::Network(_) => StoreError::Unavailable(error.to_string()),
        _ => StoreError::Query {
            table,
            message: error.to_string(),
        },
    }
}

/// Awaits one store round trip, failing if it takes longer than `timeout`.
async fn bounded<F, T>(table: Table, timeout: Duration, future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, clickhouse::error::Error>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result.map_err(|e| store_error(table, &e)),
        Err(_) => Err(StoreError::Timeout {
            table,
            after: timeout,
        }),
    }
}

fn format_nanos(nanos: i64) -> String {
    DateTime::from_timestamp_nanos(nanos).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn attributes(map: HashMap<String, String>) -> Value {
    Value::Map(
        map.into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect::<Attributes>(),
    )
}

/// Lazy row iterator over one open cursor.
struct CursorRows<T> {
    table: Table,
    cursor: RowCursor<T>,
    timeout: Duration,
    done: bool,
}

macro_rules! impl_cursor_rows {
    ($($row:ty),+ $(,)?) => {$(
        impl Iterator for CursorRows<$row> {
            type Item = Result<RawRow, StoreError>;

            fn next(&mut self) -> Option<Self::Item> {
                if self.done {
                    return None;
                }
                let (table, timeout) = (self.table, self.timeout);
                let fetched =
                    ClickHouseTelemetryStore::block_on(bounded(table, timeout, self.cursor.next()));
                match fetched {
                    Ok(Some(row)) => Some(Ok(RawRow::from(row))),
                    Ok(None) => {
                        self.done = true;
                        None
                    }
                    Err(e) => {
                        self.done = true;
                        Some(Err(e))
                    }
                }
            }
        }
    )+};
}

impl_cursor_rows!(SpanRow, SpanEventRow, SpanLinkRow, LogRow, MetricRow);

#[derive(Debug, Row, Deserialize)]
struct SpanRow {
    trace_id: String,
    span_id: String,
    name: String,
    start_time: i64,
    duration_ns: i64,
    resource_attrs: HashMap<String, String>,
}

impl From<SpanRow> for RawRow {
    fn from(row: SpanRow) -> Self {
        RawRow::new(vec![
            row.trace_id.into(),
            row.span_id.into(),
            row.name.into(),
            format_nanos(row.start_time).into(),
            row.duration_ns.into(),
            attributes(row.resource_attrs),
        ])
    }
}

#[derive(Debug, Row, Deserialize)]
struct SpanEventRow {
    trace_id: String,
    span_id: String,
    event_name: String,
    event_time: i64,
}

impl From<SpanEventRow> for RawRow {
    fn from(row: SpanEventRow) -> Self {
        RawRow::new(vec![
            row.trace_id.into(),
            row.span_id.into(),
            row.event_name.into(),
            format_nanos(row.event_time).into(),
        ])
    }
}

#[derive(Debug, Row, Deserialize)]
struct SpanLinkRow {
    trace_id: String,
    span_id: String,
    linked_trace_id: String,
    linked_span_id: String,
}

impl From<SpanLinkRow> for RawRow {
    fn from(row: SpanLinkRow) -> Self {
        RawRow::new(vec![
            row.trace_id.into(),
            row.span_id.into(),
            row.linked_trace_id.into(),
            row.linked_span_id.into(),
        ])
    }
}

#[derive(Debug, Row, Deserialize)]
struct LogRow {
    timestamp: i64,
    severity_text: String,
    body: String,
    resource_attrs: HashMap<String, String>,
}

impl From<LogRow> for RawRow {
    fn from(row: LogRow) -> Self {
        RawRow::new(vec![
            format_nanos(row.timestamp).into(),
            row.severity_text.into(),
            row.body.into(),
            attributes(row.resource_attrs),
        ])
    }
}

#[derive(Debug, Row, Deserialize)]
struct MetricRow {
    name: String,
    metric_type: i8,
    value: Option<f64>,
    histogram_payload: Option<String>,
    resource_attrs: HashMap<String, String>,
    timestamp: i64,
}

impl From<MetricRow> for RawRow {
    fn from(row: MetricRow) -> Self {
        RawRow::new(vec![
            row.name.into(),
            i64::from(row.metric_type).into(),
            row.value.into(),
            row.histogram_payload.into(),
            attributes(row.resource_attrs),
            format_nanos(row.timestamp).into(),
        ])
    }
}
