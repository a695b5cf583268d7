//! mo11y Shared Library
//!
//! This crate contains the read side of the mo11y telemetry store: the record
//! model, read-only store adapters, the row decoder and the report engine.
//!
//! # Modules
//!
//! - [`models`] - Spans, span events, span links, log records and metric points
//! - [`storage`] - Read-only tabular access to the store
//! - [`decode`] - Raw row to typed record decoding
//! - [`report`] - Section rendering and report orchestration
//! - [`config`] - Store connection settings
//!
//! # Example
//!
//! ```
//! use shared::models::{MetricPoint, MetricValue};
//! use shared::report::Render;
//!
//! let point = MetricPoint::new("temperature_celsius", MetricValue::Gauge(23.5));
//! let rendered = point.render(1).unwrap();
//!
//! assert_eq!(rendered.line, "[1] temperature_celsius (Gauge): 23.50");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod decode;
pub mod models;
pub mod report;
pub mod storage;

/// Re-export common dependencies for convenience.
pub use serde_json;
