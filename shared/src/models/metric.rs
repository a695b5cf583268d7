//! Metric data model.
//!
//! Defines `MetricPoint` and the metric kind resolver shared by the decoder
//! and the renderer.

use super::Attributes;
use serde::Serialize;
use thiserror::Error;

/// A metric type code outside the known set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unknown metric type code: {0}")]
pub struct UnknownMetricType(pub i64);

/// Kind of metric, as encoded by the store's `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MetricKind {
    /// A value that can go up or down (e.g., temperature).
    Gauge,
    /// A cumulative or delta sum (e.g., request count).
    Sum,
    /// A distribution of observations (e.g., request latency).
    Histogram,
}

impl MetricKind {
    /// All kinds, in code order.
    pub const ALL: [Self; 3] = [Self::Gauge, Self::Sum, Self::Histogram];

    /// Resolves a store type code.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMetricType` for any code other than 1, 2 or 3.
    pub fn from_code(code: i64) -> Result<Self, UnknownMetricType> {
        match code {
            1 => Ok(Self::Gauge),
            2 => Ok(Self::Sum),
            3 => Ok(Self::Histogram),
            other => Err(UnknownMetricType(other)),
        }
    }

    /// The store type code for this kind.
    #[must_use]
    pub const fn code(self) -> i8 {
        match self {
            Self::Gauge => 1,
            Self::Sum => 2,
            Self::Histogram => 3,
        }
    }

    /// Human-readable kind name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gauge => "Gauge",
            Self::Sum => "Sum",
            Self::Histogram => "Histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the display name for a store type code.
///
/// # Errors
///
/// Returns `UnknownMetricType` if the code is not a known kind.
///
/// # Example
///
/// ```
/// use shared::models::name_for;
///
/// assert_eq!(name_for(3).unwrap(), "Histogram");
/// assert!(name_for(7).is_err());
/// ```
pub fn name_for(code: i64) -> Result<&'static str, UnknownMetricType> {
    MetricKind::from_code(code).map(MetricKind::name)
}

/// The value of a metric point, which depends on its kind.
///
/// Only histograms carry a payload, so a gauge or sum can never hold one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum MetricValue {
    /// Gauge reading.
    Gauge(f64),
    /// Sum reading.
    Sum(f64),
    /// Serialized histogram bucket data, opaque to this crate.
    Histogram(String),
}

impl MetricValue {
    /// Returns the kind this value belongs to.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        match self {
            Self::Gauge(_) => MetricKind::Gauge,
            Self::Sum(_) => MetricKind::Sum,
            Self::Histogram(_) => MetricKind::Histogram,
        }
    }
}

/// A single metric data point read from the store.
///
/// # Example
///
/// ```
/// use shared::models::{MetricKind, MetricPoint, MetricValue};
///
/// let point = MetricPoint::new("temperature_celsius", MetricValue::Gauge(23.5));
/// assert_eq!(point.kind(), MetricKind::Gauge);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    /// The metric name (e.g., "`requests_total`").
    pub name: String,

    /// The kind-specific value.
    pub value: MetricValue,

    /// Attributes of the resource that produced the metric.
    pub resource_attrs: Attributes,

    /// When the point was recorded, as ISO-8601-like text.
    pub timestamp: String,
}

impl MetricPoint {
    /// Creates a metric point with no attributes and an empty timestamp.
    #[must_use]
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            value,
            resource_attrs: Attributes::new(),
            timestamp: String::new(),
        }
    }

    /// Sets the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Adds a resource attribute.
    #[must_use]
    pub fn with_resource_attr(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.resource_attrs.insert(key.into(), value.into());
        self
    }

    /// The kind of this point.
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        self.value.kind()
    }
}
