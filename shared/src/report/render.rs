//! Per-record line formatting.
//!
//! Rendering is pure: the same record always yields the same lines. Widths
//! count characters, so truncation never splits a UTF-8 sequence.

use crate::models::{LogRecord, MetricPoint, MetricValue, Span, SpanEvent, SpanLink, SERVICE_NAME};
use thiserror::Error;

/// Characters of a trace or span id shown in a line.
pub const ID_WIDTH: usize = 8;

/// Characters of a log timestamp shown in a line (second precision).
pub const TIMESTAMP_WIDTH: usize = 19;

/// Characters of a histogram payload shown before the `...` suffix.
pub const HISTOGRAM_PREVIEW_WIDTH: usize = 50;

/// Errors that can occur while rendering a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    /// An identifier is shorter than the display width.
    #[error("Malformed identifier {field}='{value}': expected at least {width} characters", width = ID_WIDTH)]
    MalformedIdentifier {
        /// The record field holding the identifier.
        field: &'static str,
        /// The identifier as stored.
        value: String,
    },

    /// A log timestamp is shorter than the display width.
    #[error("Malformed timestamp '{value}': expected at least {width} characters", width = TIMESTAMP_WIDTH)]
    MalformedTimestamp {
        /// The timestamp as stored.
        value: String,
    },
}

/// The lines rendered for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRecord {
    /// The `[n] ...` line.
    pub line: String,
    /// Indented detail lines printed under `line`.
    pub details: Vec<String>,
}

impl RenderedRecord {
    fn line(line: String) -> Self {
        Self {
            line,
            details: Vec::new(),
        }
    }
}

/// A record that can be rendered as a report line.
pub trait Render {
    /// Renders the record as the `seq`-th (1-based) record of its section.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is too short to be displayed at its
    /// fixed width.
    fn render(&self, seq: usize) -> Result<RenderedRecord, RenderError>;
}

/// Returns the first `min(len, width)` characters of `s`.
#[must_use]
pub fn truncate(s: &str, width: usize) -> &str {
    s.char_indices().nth(width).map_or(s, |(idx, _)| &s[..idx])
}

/// Returns the first `width` characters of `s`, or `None` if `s` is shorter.
fn exact_prefix(s: &str, width: usize) -> Option<&str> {
    let prefix = truncate(s, width);
    (prefix.chars().count() == width).then_some(prefix)
}

fn short_id<'a>(field: &'static str, id: &'a str) -> Result<&'a str, RenderError> {
    exact_prefix(id, ID_WIDTH).ok_or_else(|| RenderError::MalformedIdentifier {
        field,
        value: id.to_string(),
    })
}

/// Formats an attribute value: strings bare, anything else as JSON.
fn attribute_display(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Render for Span {
    fn render(&self, seq: usize) -> Result<RenderedRecord, RenderError> {
        let trace = short_id("trace_id", &self.trace_id)?;
        let span = short_id("span_id", &self.span_id)?;

        let mut rendered = RenderedRecord::line(format!(
            "[{seq}] {trace}/{span}: {} ({:.2}ms)",
            self.name,
            self.duration_ms()
        ));
        if let Some(service) = self.service_name() {
            rendered
                .details
                .push(format!("{SERVICE_NAME}={}", attribute_display(service)));
        }
        Ok(rendered)
    }
}

impl Render for SpanEvent {
    fn render(&self, seq: usize) -> Result<RenderedRecord, RenderError> {
        let trace = short_id("trace_id", &self.trace_id)?;
        let span = short_id("span_id", &self.span_id)?;
        Ok(RenderedRecord::line(format!(
            "[{seq}] {trace}/{span}: {}",
            self.event_name
        )))
    }
}

impl Render for SpanLink {
    fn render(&self, seq: usize) -> Result<RenderedRecord, RenderError> {
        let trace = short_id("trace_id", &self.trace_id)?;
        let span = short_id("span_id", &self.span_id)?;
        let linked_trace = short_id("linked_trace_id", &self.linked_trace_id)?;
        let linked_span = short_id("linked_span_id", &self.linked_span_id)?;
        Ok(RenderedRecord::line(format!(
            "[{seq}] {trace}/{span} -> {linked_trace}/{linked_span}"
        )))
    }
}

impl Render for LogRecord {
    fn render(&self, seq: usize) -> Result<RenderedRecord, RenderError> {
        let timestamp = exact_prefix(&self.timestamp, TIMESTAMP_WIDTH).ok_or_else(|| {
            RenderError::MalformedTimestamp {
                value: self.timestamp.clone(),
            }
        })?;
        Ok(RenderedRecord::line(format!(
            "[{seq}] {timestamp} {}: {}",
            self.severity_text, self.body
        )))
    }
}

impl Render for MetricPoint {
    fn render(&self, seq: usize) -> Result<RenderedRecord, RenderError> {
        let kind = self.kind();
        let line = match &self.value {
            MetricValue::Gauge(value) | MetricValue::Sum(value) => {
                format!("[{seq}] {} ({kind}): {value:.2}", self.name)
            }
            // The suffix is appended even when nothing was cut.
            MetricValue::Histogram(payload) => format!(
                "[{seq}] {} ({kind}): {}...",
                self.name,
                truncate(payload, HISTOGRAM_PREVIEW_WIDTH)
            ),
        };
        Ok(RenderedRecord::line(line))
    }
}
