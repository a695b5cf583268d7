//! Trace data models: spans, span events and span links.

use super::Attributes;
use serde::Serialize;

/// Resource attribute naming the service that produced a record.
pub const SERVICE_NAME: &str = "service.name";

/// A completed span read from the store.
///
/// # Example
///
/// ```
/// use shared::models::Span;
///
/// let span = Span::new("abcdef1234567890", "1122334455667788", "op")
///     .with_duration_ns(1_500_000)
///     .with_resource_attr("service.name", "checkout");
///
/// assert!((span.duration_ms() - 1.5).abs() < f64::EPSILON);
/// assert!(span.service_name().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    /// Hex-encoded trace identifier.
    pub trace_id: String,

    /// Hex-encoded span identifier, unique within the trace.
    pub span_id: String,

    /// The operation name.
    pub name: String,

    /// When the span started, as ISO-8601-like text.
    pub start_time: String,

    /// Span duration in nanoseconds.
    pub duration_ns: u64,

    /// Attributes of the resource that produced the span.
    pub resource_attrs: Attributes,
}

impl Span {
    /// Creates a span with zero duration and no attributes.
    #[must_use]
    pub fn new(
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            name: name.into(),
            start_time: String::new(),
            duration_ns: 0,
            resource_attrs: Attributes::new(),
        }
    }

    /// Sets the start time.
    #[must_use]
    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = start_time.into();
        self
    }

    /// Sets the duration in nanoseconds.
    #[must_use]
    pub fn with_duration_ns(mut self, duration_ns: u64) -> Self {
        self.duration_ns = duration_ns;
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

    /// Returns the duration in milliseconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_ms(&self) -> f64 {
        self.duration_ns as f64 / 1_000_000.0
    }

    /// Returns the `service.name` resource attribute, if present.
    #[must_use]
    pub fn service_name(&self) -> Option<&serde_json::Value> {
        self.resource_attrs.get(SERVICE_NAME)
    }
}

/// A timestamped event recorded on a span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanEvent {
    /// Trace of the owning span.
    pub trace_id: String,
    /// The owning span.
    pub span_id: String,
    /// The event name.
    pub event_name: String,
    /// When the event occurred, as ISO-8601-like text.
    pub event_time: String,
}

/// A non-hierarchical causal link from one span to another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanLink {
    /// Trace of the source span.
    pub trace_id: String,
    /// The source span.
    pub span_id: String,
    /// Trace of the linked span.
    pub linked_trace_id: String,
    /// The linked span.
    pub linked_span_id: String,
}
