//! Report orchestration.
//!
//! Runs the five sections in a fixed order: Spans, Span Events, Span Links,
//! Logs, Metrics. Each section issues its query, decodes and renders every
//! row, then prints its total. Any store, decode or render failure aborts the
//! whole report; a partial report is never returned as a success.
//!
//! # Example
//!
//! ```
//! use shared::report::{run_report, RecordKind};
//! use shared::storage::{InMemoryTelemetryStore, Table, Value};
//!
//! let store = InMemoryTelemetryStore::new();
//! store
//!     .insert(
//!         Table::Spans,
//!         [
//!             ("trace_id", Value::from("abcdef1234567890")),
//!             ("span_id", Value::from("1122334455667788")),
//!             ("name", Value::from("op")),
//!             ("start_time", Value::from("2024-01-15T10:30:00Z")),
//!             ("duration_ns", Value::from(1_500_000_i64)),
//!         ],
//!     )
//!     .unwrap();
//!
//! let mut out = Vec::new();
//! let outcome = run_report(&store, &mut out).unwrap();
//!
//! assert_eq!(outcome.count(RecordKind::Span), 1);
//! assert!(String::from_utf8(out).unwrap().contains("[1] abcdef12/11223344: op (1.50ms)"));
//! ```

mod render;
mod section;

pub use render::{
    truncate, Render, RenderError, RenderedRecord, HISTOGRAM_PREVIEW_WIDTH, ID_WIDTH,
    TIMESTAMP_WIDTH,
};
pub use section::{RecordError, RecordKind, Section};

use crate::decode::DecodeError;
use crate::storage::{StoreError, TelemetryStore};
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

/// Diagnostic printed when every section is empty.
pub const EMPTY_DATASET_MESSAGE: &str =
    "No data found. Send telemetry to the collector before running the report.";

/// Errors that abort a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The store could not be opened or queried.
    #[error("Store unavailable while reading {section}: {source}")]
    StoreUnavailable {
        /// The section being read.
        section: &'static str,
        /// The store failure.
        #[source]
        source: StoreError,
    },

    /// A row could not be decoded.
    #[error("Failed to decode {section} record {seq}: {source}")]
    Decode {
        /// The section being read.
        section: &'static str,
        /// 1-based position of the row in the section.
        seq: usize,
        /// The decode failure.
        #[source]
        source: DecodeError,
    },

    /// A record could not be rendered.
    #[error("Failed to render {section} record {seq}: {source}")]
    Render {
        /// The section being read.
        section: &'static str,
        /// 1-based position of the record in the section.
        seq: usize,
        /// The render failure.
        #[source]
        source: RenderError,
    },

    /// The report could not be written.
    #[error("Failed to write report: {0}")]
    Output(#[from] std::io::Error),
}

impl ReportError {
    fn record(section: &'static str, seq: usize, error: RecordError) -> Self {
        match error {
            RecordError::Decode(source) => Self::Decode {
                section,
                seq,
                source,
            },
            RecordError::Render(source) => Self::Render {
                section,
                seq,
                source,
            },
        }
    }
}

/// Number of records printed for one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionTotal {
    /// The section's record kind.
    pub kind: RecordKind,
    /// Records streamed and printed.
    pub count: usize,
}

/// The result of a completed report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReportOutcome {
    totals: Vec<SectionTotal>,
}

impl ReportOutcome {
    /// Per-section totals, in report order.
    #[must_use]
    pub fn totals(&self) -> &[SectionTotal] {
        &self.totals
    }

    /// Records printed for `kind`.
    #[must_use]
    pub fn count(&self, kind: RecordKind) -> usize {
        self.totals
            .iter()
            .find(|t| t.kind == kind)
            .map_or(0, |t| t.count)
    }

    /// Records printed across all sections.
    #[must_use]
    pub fn total(&self) -> usize {
        self.totals.iter().map(|t| t.count).sum()
    }

    /// Returns true if every section was empty.
    ///
    /// This is "no data yet", not a failure.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.totals.iter().all(|t| t.count == 0)
    }
}

/// Where the report is in its fixed section sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportState {
    Section(RecordKind),
    Done,
}

impl ReportState {
    fn after(kind: RecordKind) -> Self {
        kind.next().map_or(Self::Done, Self::Section)
    }
}

/// Runs all five sections against `store`, writing the report to `out`.
///
/// # Errors
///
/// Returns the first store, decode, render or write failure. Output already
/// written for earlier sections must not be treated as a valid report.
pub fn run_report<S, W>(store: &S, out: &mut W) -> Result<ReportOutcome, ReportError>
where
    S: TelemetryStore + ?Sized,
    W: Write,
{
    let mut totals = Vec::with_capacity(RecordKind::ALL.len());
    let mut state = ReportState::Section(RecordKind::first());

    while let ReportState::Section(kind) = state {
        let section = kind.section();
        if kind != RecordKind::first() {
            writeln!(out)?;
        }

        let count = run_section(store, section, out).inspect_err(|e| {
            tracing::error!(section = section.plural, error = %e, "Report aborted");
        })?;
        totals.push(SectionTotal { kind, count });

        state = ReportState::after(kind);
    }
    out.flush()?;

    let outcome = ReportOutcome { totals };
    if outcome.is_empty() {
        tracing::info!("Every section is empty");
    }
    Ok(outcome)
}

/// Streams one section. The row stream is dropped before returning, so at
/// most one cursor is open at a time.
fn run_section<S, W>(store: &S, section: &Section, out: &mut W) -> Result<usize, ReportError>
where
    S: TelemetryStore + ?Sized,
    W: Write,
{
    writeln!(out, "=== {} ===", section.title)?;
    tracing::debug!(section = section.plural, table = %section.table, "Querying section");

    let rows = store
        .query(section.table)
        .map_err(|source| ReportError::StoreUnavailable {
            section: section.plural,
            source,
        })?;

    let mut count = 0;
    for row in rows {
        let row = row.map_err(|source| ReportError::StoreUnavailable {
            section: section.plural,
            source,
        })?;
        count += 1;

        let rendered = section
            .render_row(row, count)
            .map_err(|e| ReportError::record(section.plural, count, e))?;

        writeln!(out, "  {}", rendered.line)?;
        for detail in &rendered.details {
            writeln!(out, "      {detail}")?;
        }
    }

    writeln!(out, "Total: {count} {}", section.plural)?;
    tracing::info!(section = section.plural, count, "Section complete");
    Ok(count)
}
