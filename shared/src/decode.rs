//! Record decoder.
//!
//! Maps raw rows from the store into typed records. String fields are taken
//! verbatim; display widths are a rendering concern and are not applied here.

use crate::models::{
    Attributes, LogRecord, MetricKind, MetricPoint, MetricValue, Span, SpanEvent, SpanLink,
    UnknownMetricType,
};
use crate::storage::{RawRow, Table, Value};
use thiserror::Error;

/// Errors that can occur while decoding a row.
///
/// Every variant is fatal for the row.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    /// A metric row's type code is not Gauge, Sum or Histogram.
    #[error(transparent)]
    UnknownMetricType(#[from] UnknownMetricType),

    /// A histogram row has no payload.
    #[error("Histogram metric '{name}' has no payload")]
    MissingHistogramPayload {
        /// The metric name.
        name: String,
    },

    /// The row does not have one cell per projected column.
    #[error("Row from {table} has {found} columns, expected {expected}")]
    ColumnCount {
        /// The table read.
        table: Table,
        /// Number of projected columns.
        expected: usize,
        /// Number of cells in the row.
        found: usize,
    },

    /// A cell does not have the column's type.
    #[error("Column {table}.{column} expected {expected}, found {found}")]
    ColumnType {
        /// The table read.
        table: Table,
        /// The column name.
        column: &'static str,
        /// The expected cell type.
        expected: &'static str,
        /// The cell type found.
        found: &'static str,
    },

    /// A span duration is negative.
    #[error("Span duration cannot be negative: {value}ns")]
    NegativeDuration {
        /// The stored duration.
        value: i64,
    },
}

/// A record that can be decoded from one row of its table.
pub trait Decode: Sized {
    /// The table this record is read from.
    const TABLE: Table;

    /// Decodes one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row's shape does not match the table's
    /// projection or violates a record invariant.
    fn decode(row: RawRow) -> Result<Self, DecodeError>;
}

/// Walks a row's cells alongside the table's column names.
struct Cells {
    table: Table,
    columns: std::slice::Iter<'static, &'static str>,
    cells: std::vec::IntoIter<Value>,
}

impl Cells {
    fn new(table: Table, row: RawRow) -> Result<Self, DecodeError> {
        let expected = table.columns().len();
        if row.len() != expected {
            return Err(DecodeError::ColumnCount {
                table,
                expected,
                found: row.len(),
            });
        }

        Ok(Self {
            table,
            columns: table.columns().iter(),
            cells: row.into_cells().into_iter(),
        })
    }

    fn next(&mut self) -> (&'static str, Value) {
        // Lengths were checked in `new`.
        let column = self.columns.next().copied().unwrap_or("?");
        let cell = self.cells.next().unwrap_or(Value::Null);
        (column, cell)
    }

    fn mismatch(&self, column: &'static str, expected: &'static str, found: &Value) -> DecodeError {
        DecodeError::ColumnType {
            table: self.table,
            column,
            expected,
            found: found.type_name(),
        }
    }

    fn text(&mut self) -> Result<String, DecodeError> {
        match self.next() {
            (_, Value::Text(s)) => Ok(s),
            (column, other) => Err(self.mismatch(column, "text", &other)),
        }
    }

    fn optional_text(&mut self) -> Result<Option<String>, DecodeError> {
        match self.next() {
            (_, Value::Text(s)) => Ok(Some(s)),
            (_, Value::Null) => Ok(None),
            (column, other) => Err(self.mismatch(column, "text or null", &other)),
        }
    }

    fn int(&mut self) -> Result<i64, DecodeError> {
        match self.next() {
            (_, Value::Int(v)) => Ok(v),
            (column, other) => Err(self.mismatch(column, "int", &other)),
        }
    }

    /// Reads a float cell, accepting integers.
    #[allow(clippy::cast_precision_loss)]
    fn float(&mut self) -> Result<f64, DecodeError> {
        match self.next() {
            (_, Value::Float(v)) => Ok(v),
            (_, Value::Int(v)) => Ok(v as f64),
            (column, other) => Err(self.mismatch(column, "float", &other)),
        }
    }

    /// Reads a float cell that may be null.
    #[allow(clippy::cast_precision_loss)]
    fn optional_float(&mut self) -> Result<Option<f64>, DecodeError> {
        match self.next() {
            (_, Value::Float(v)) => Ok(Some(v)),
            (_, Value::Int(v)) => Ok(Some(v as f64)),
            (_, Value::Null) => Ok(None),
            (column, other) => Err(self.mismatch(column, "float or null", &other)),
        }
    }

    /// Reads an attribute map; a null map is an empty one.
    fn attributes(&mut self) -> Result<Attributes, DecodeError> {
        match self.next() {
            (_, Value::Map(attrs)) => Ok(attrs),
            (_, Value::Null) => Ok(Attributes::new()),
            (column, other) => Err(self.mismatch(column, "map", &other)),
        }
    }
}

impl Decode for Span {
    const TABLE: Table = Table::Spans;

    fn decode(row: RawRow) -> Result<Self, DecodeError> {
        let mut cells = Cells::new(Self::TABLE, row)?;
        let trace_id = cells.text()?;
        let span_id = cells.text()?;
        let name = cells.text()?;
        let start_time = cells.text()?;
        let duration = cells.int()?;
        let duration_ns =
            u64::try_from(duration).map_err(|_| DecodeError::NegativeDuration { value: duration })?;
        let resource_attrs = cells.attributes()?;

        Ok(Self {
            trace_id,
            span_id,
            name,
            start_time,
            duration_ns,
            resource_attrs,
        })
    }
}

impl Decode for SpanEvent {
    const TABLE: Table = Table::SpanEvents;

    fn decode(row: RawRow) -> Result<Self, DecodeError> {
        let mut cells = Cells::new(Self::TABLE, row)?;
        Ok(Self {
            trace_id: cells.text()?,
            span_id: cells.text()?,
            event_name: cells.text()?,
            event_time: cells.text()?,
        })
    }
}

impl Decode for SpanLink {
    const TABLE: Table = Table::SpanLinks;

    fn decode(row: RawRow) -> Result<Self, DecodeError> {
        let mut cells = Cells::new(Self::TABLE, row)?;
        Ok(Self {
            trace_id: cells.text()?,
            span_id: cells.text()?,
            linked_trace_id: cells.text()?,
            linked_span_id: cells.text()?,
        })
    }
}

impl Decode for LogRecord {
    const TABLE: Table = Table::Logs;

    fn decode(row: RawRow) -> Result<Self, DecodeError> {
        let mut cells = Cells::new(Self::TABLE, row)?;
        Ok(Self {
            timestamp: cells.text()?,
            severity_text: cells.text()?,
            body: cells.text()?,
            resource_attrs: cells.attributes()?,
        })
    }
}

impl Decode for MetricPoint {
    const TABLE: Table = Table::Metrics;

    fn decode(row: RawRow) -> Result<Self, DecodeError> {
        let mut cells = Cells::new(Self::TABLE, row)?;
        let name = cells.text()?;
        let kind = MetricKind::from_code(cells.int()?)?;
        let value = cells.optional_float()?;
        let payload = cells.optional_text()?;
        let resource_attrs = cells.attributes()?;
        let timestamp = cells.text()?;

        let value = match kind {
            MetricKind::Histogram => match payload {
                Some(payload) => MetricValue::Histogram(payload),
                None => return Err(DecodeError::MissingHistogramPayload { name }),
            },
            MetricKind::Gauge | MetricKind::Sum => {
                let Some(number) = value else {
                    return Err(DecodeError::ColumnType {
                        table: Self::TABLE,
                        column: "value",
                        expected: "float",
                        found: Value::Null.type_name(),
                    });
                };
                if kind == MetricKind::Gauge {
                    MetricValue::Gauge(number)
                } else {
                    MetricValue::Sum(number)
                }
            }
        };

        Ok(Self {
            name,
            value,
            resource_attrs,
            timestamp,
        })
    }
}
