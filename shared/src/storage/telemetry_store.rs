//! Telemetry store trait and the in-memory implementation.
//!
//! Provides the `TelemetryStore` trait, the read-only tabular interface the
//! report pulls rows through, and an `InMemoryTelemetryStore` for development
//! and testing.

use super::table::{RawRow, Table, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while querying a telemetry store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A query against one table failed.
    #[error("Query on {table} failed: {message}")]
    Query {
        /// The table being read.
        table: Table,
        /// The store's error message.
        message: String,
    },

    /// A query did not complete within the section deadline.
    #[error("Query on {table} timed out after {after:?}")]
    Timeout {
        /// The table being read.
        table: Table,
        /// The configured bound.
        after: Duration,
    },

    /// Failed to acquire lock on the store.
    #[error("Failed to acquire lock on telemetry store")]
    LockError,
}

/// A forward-only, finite stream of rows. Issue a new query to read again.
pub type RowStream<'a> = Box<dyn Iterator<Item = Result<RawRow, StoreError>> + 'a>;

/// Trait for read-only telemetry store implementations.
///
/// Implementations must be thread-safe (Send + Sync) and must never write
/// to the underlying store.
pub trait TelemetryStore: Send + Sync {
    /// Runs the fixed projection query for `table`, sorted ascending by the
    /// table's ordering column.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or the query is rejected.
    /// Failures while streaming surface as `Err` items of the stream.
    fn query(&self, table: Table) -> Result<RowStream<'_>, StoreError>;

    /// Checks that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn ping(&self) -> Result<(), StoreError>;
}

/// A stored row: column name to cell.
pub type StoredRow = HashMap<String, Value>;

/// In-memory telemetry store implementation.
///
/// Rows are kept per table in insertion order; queries sort a snapshot so the
/// store itself is never reordered.
#[derive(Debug, Default)]
pub struct InMemoryTelemetryStore {
    tables: Arc<RwLock<HashMap<Table, Vec<StoredRow>>>>,
}

impl InMemoryTelemetryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Appends a row to `table`. Columns not given read back as `Null`.
    ///
    /// This is the writer side used by tests and fixtures; the `TelemetryStore`
    /// trait itself stays read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn insert<K, V>(
        &self,
        table: Table,
        row: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), StoreError>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let row: StoredRow = row
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut tables = self.tables.write().map_err(|_| StoreError::LockError)?;
        tables.entry(table).or_default().push(row);
        Ok(())
    }
}

impl TelemetryStore for InMemoryTelemetryStore {
    fn query(&self, table: Table) -> Result<RowStream<'_>, StoreError> {
        let mut rows = {
            let tables = self.tables.read().map_err(|_| StoreError::LockError)?;
            tables.get(&table).cloned().unwrap_or_default()
        };

        if let Some(order) = table.order_by() {
            rows.sort_by(|a, b| {
                let a = a.get(order).unwrap_or(&Value::Null);
                let b = b.get(order).unwrap_or(&Value::Null);
                a.sort_cmp(b)
            });
        }

        tracing::debug!(%table, rows = rows.len(), "In-memory query");

        let projected = rows.into_iter().map(move |mut row| -> Result<RawRow, StoreError> {
            Ok(table
                .columns()
                .iter()
                .map(|column| row.remove(*column).unwrap_or(Value::Null))
                .collect())
        });

        Ok(Box::new(projected))
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.tables.read().map_err(|_| StoreError::LockError)?;
        Ok(())
    }
}
