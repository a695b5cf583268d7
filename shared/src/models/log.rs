//! Log data model.

use super::Attributes;
use serde::Serialize;

/// A log record read from the store.
///
/// `severity_text` is free text; no level enum is enforced because producers
/// are free to send whatever their logging bridge emits.
///
/// # Example
///
/// ```
/// use shared::models::LogRecord;
///
/// let log = LogRecord::new("2024-01-15T10:30:00.123456789Z", "INFO", "User logged in");
/// assert_eq!(log.severity_text, "INFO");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// When the record was emitted, as ISO-8601-like text.
    pub timestamp: String,

    /// Severity as sent by the producer (e.g., INFO, WARN, ERROR).
    pub severity_text: String,

    /// The log body.
    pub body: String,

    /// Attributes of the resource that produced the record.
    pub resource_attrs: Attributes,
}

impl LogRecord {
    /// Creates a log record with no attributes.
    #[must_use]
    pub fn new(
        timestamp: impl Into<String>,
        severity_text: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            severity_text: severity_text.into(),
            body: body.into(),
            resource_attrs: Attributes::new(),
        }
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
}
