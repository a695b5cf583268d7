//! Data models for the records read from the telemetry store.
//!
//! Records are immutable snapshots; nothing in this crate writes them back.

pub mod log;
pub mod metric;
pub mod trace;

use std::collections::HashMap;

/// Resource attributes: unique keys, order irrelevant.
pub type Attributes = HashMap<String, serde_json::Value>;

pub use log::LogRecord;
pub use metric::{name_for, MetricKind, MetricPoint, MetricValue, UnknownMetricType};
pub use trace::{Span, SpanEvent, SpanLink, SERVICE_NAME};
