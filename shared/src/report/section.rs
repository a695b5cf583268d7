//! Section descriptors.
//!
//! One descriptor per record kind ties together the table to query, how a
//! row becomes a line, and the section's header and total wording. Adding a
//! record kind means adding a descriptor, not another control-flow branch.

use super::render::{Render, RenderError, RenderedRecord};
use crate::decode::{Decode, DecodeError};
use crate::models::{LogRecord, MetricPoint, Span, SpanEvent, SpanLink};
use crate::storage::{RawRow, Table};
use serde::Serialize;
use thiserror::Error;

/// The record kinds, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Spans.
    Span,
    /// Span events.
    SpanEvent,
    /// Span links.
    SpanLink,
    /// Log records.
    Log,
    /// Metric points.
    Metric,
}

impl RecordKind {
    /// All kinds, in report order.
    pub const ALL: [Self; 5] = [
        Self::Span,
        Self::SpanEvent,
        Self::SpanLink,
        Self::Log,
        Self::Metric,
    ];

    /// The first section of a report.
    #[must_use]
    pub const fn first() -> Self {
        Self::Span
    }

    /// The section after this one, or `None` after the last.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Span => Some(Self::SpanEvent),
            Self::SpanEvent => Some(Self::SpanLink),
            Self::SpanLink => Some(Self::Log),
            Self::Log => Some(Self::Metric),
            Self::Metric => None,
        }
    }

    /// The descriptor for this kind.
    #[must_use]
    pub fn section(self) -> &'static Section {
        match self {
            Self::Span => &SECTIONS[0],
            Self::SpanEvent => &SECTIONS[1],
            Self::SpanLink => &SECTIONS[2],
            Self::Log => &SECTIONS[3],
            Self::Metric => &SECTIONS[4],
        }
    }
}

/// Failure to turn one row into a line.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    /// The row could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The record could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),
}

type RenderRowFn = fn(RawRow, usize) -> Result<RenderedRecord, RecordError>;

/// Describes one report section.
#[derive(Debug)]
pub struct Section {
    /// The record kind.
    pub kind: RecordKind,
    /// Header text, printed as `=== <title> ===`.
    pub title: &'static str,
    /// Plural noun used in the `Total:` line.
    pub plural: &'static str,
    /// The table to query.
    pub table: Table,
    render_row: RenderRowFn,
}

impl Section {
    /// Decodes and renders one row as the `seq`-th record of this section.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be decoded or rendered.
    pub fn render_row(&self, row: RawRow, seq: usize) -> Result<RenderedRecord, RecordError> {
        (self.render_row)(row, seq)
    }
}

fn decode_and_render<R: Decode + Render>(
    row: RawRow,
    seq: usize,
) -> Result<RenderedRecord, RecordError> {
    let record = R::decode(row)?;
    Ok(record.render(seq)?)
}

static SECTIONS: [Section; 5] = [
    Section {
        kind: RecordKind::Span,
        title: "SPANS",
        plural: "spans",
        table: Span::TABLE,
        render_row: decode_and_render::<Span>,
    },
    Section {
        kind: RecordKind::SpanEvent,
        title: "SPAN EVENTS",
        plural: "events",
        table: SpanEvent::TABLE,
        render_row: decode_and_render::<SpanEvent>,
    },
    Section {
        kind: RecordKind::SpanLink,
        title: "SPAN LINKS",
        plural: "links",
        table: SpanLink::TABLE,
        render_row: decode_and_render::<SpanLink>,
    },
    Section {
        kind: RecordKind::Log,
        title: "LOGS",
        plural: "logs",
        table: LogRecord::TABLE,
        render_row: decode_and_render::<LogRecord>,
    },
    Section {
        kind: RecordKind::Metric,
        title: "METRICS",
        plural: "metrics",
        table: MetricPoint::TABLE,
        render_row: decode_and_render::<MetricPoint>,
    },
];
