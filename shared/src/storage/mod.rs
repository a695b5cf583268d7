//! Read-only tabular access to the telemetry store.
//!
//! The `TelemetryStore` trait runs one fixed projection query per table and
//! yields a forward-only stream of raw rows. Decoding those rows into typed
//! records is the job of [`crate::decode`].

pub mod clickhouse_store;
pub mod duckdb_store;
pub mod table;
pub mod telemetry_store;

pub use clickhouse_store::{ClickHouseTelemetryStore, DEFAULT_QUERY_TIMEOUT};
pub use duckdb_store::DuckDbTelemetryStore;
pub use table::{RawRow, Table, Value};
pub use telemetry_store::{
    InMemoryTelemetryStore, RowStream, StoreError, StoredRow, TelemetryStore,
};

use crate::config::{StoreBackend, StoreConfig};

/// Opens the store selected by `config.backend`.
///
/// # Errors
///
/// Returns `StoreError::Unavailable` if the DuckDB file cannot be opened.
/// A `ClickHouse` store connects lazily, so its failures surface on the
/// first query.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn TelemetryStore>, StoreError> {
    match config.backend {
        StoreBackend::DuckDb => Ok(Box::new(DuckDbTelemetryStore::from_config(config)?)),
        StoreBackend::ClickHouse => Ok(Box::new(ClickHouseTelemetryStore::from_config(config))),
    }
}
