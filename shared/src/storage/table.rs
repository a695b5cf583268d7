//! Table descriptors and the raw row representation.
//!
//! Each record kind is read from one table with a fixed projection and at most
//! one ascending sort key. The adapter does not support arbitrary projections.

use crate::models::Attributes;
use serde::Serialize;

/// The five tables the report reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Completed spans.
    Spans,
    /// Events recorded on spans.
    SpanEvents,
    /// Links between spans.
    SpanLinks,
    /// Log records.
    Logs,
    /// Metric data points.
    Metrics,
}

impl Table {
    /// All tables, in report order.
    pub const ALL: [Self; 5] = [
        Self::Spans,
        Self::SpanEvents,
        Self::SpanLinks,
        Self::Logs,
        Self::Metrics,
    ];

    /// The table name in the store.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Spans => "spans",
            Self::SpanEvents => "span_events",
            Self::SpanLinks => "span_links",
            Self::Logs => "logs",
            Self::Metrics => "metrics",
        }
    }

    /// The projected columns, in the order cells appear in a `RawRow`.
    #[must_use]
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Spans => &[
                "trace_id",
                "span_id",
                "name",
                "start_time",
                "duration_ns",
                "resource_attrs",
            ],
            Self::SpanEvents => &["trace_id", "span_id", "event_name", "event_time"],
            Self::SpanLinks => &["trace_id", "span_id", "linked_trace_id", "linked_span_id"],
            Self::Logs => &["timestamp", "severity_text", "body", "resource_attrs"],
            Self::Metrics => &[
                "name",
                "type",
                "value",
                "histogram_payload",
                "resource_attrs",
                "timestamp",
            ],
        }
    }

    /// The ascending sort column, if the table has one.
    ///
    /// Links carry no ordering key and come back in store order.
    #[must_use]
    pub const fn order_by(self) -> Option<&'static str> {
        match self {
            Self::Spans => Some("start_time"),
            Self::SpanEvents => Some("event_time"),
            Self::SpanLinks => None,
            Self::Logs | Self::Metrics => Some("timestamp"),
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Any integer column.
    Int(i64),
    /// Any floating point column.
    Float(f64),
    /// Any string column.
    Text(String),
    /// A string-keyed map column.
    Map(Attributes),
}

impl Value {
    /// Short name of the cell type, used in decode errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Map(_) => "map",
        }
    }

    /// Compares two cells for sorting. Nulls sort first; cells of different
    /// types compare equal so a stable sort keeps their relative order.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;

        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Attributes> for Value {
    fn from(value: Attributes) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One row of a projection query, cells in `Table::columns` order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    cells: Vec<Value>,
}

impl RawRow {
    /// Creates a row from its cells.
    #[must_use]
    pub fn new(cells: Vec<Value>) -> Self {
        Self { cells }
    }

    /// Number of cells in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the cells.
    #[must_use]
    pub fn cells(&self) -> &[Value] {
        &self.cells
    }

    /// Consumes the row, returning its cells.
    #[must_use]
    pub fn into_cells(self) -> Vec<Value> {
        self.cells
    }
}

impl FromIterator<Value> for RawRow {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
