//! Integration tests for the report engine.
//!
//! These tests run complete reports against in-memory and hand-built stores
//! and check the exact text output, the section totals and the abort paths.

use shared::decode::DecodeError;
use shared::report::{run_report, RecordKind, RenderError, ReportError, ReportOutcome};
use shared::storage::{
    InMemoryTelemetryStore, RawRow, RowStream, StoreError, Table, TelemetryStore, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Runs a report, returning the outcome and everything written.
fn report(store: &dyn TelemetryStore) -> (Result<ReportOutcome, ReportError>, String) {
    let mut out = Vec::new();
    let result = run_report(store, &mut out);
    (result, String::from_utf8(out).unwrap())
}

fn attrs(pairs: &[(&str, &str)]) -> Value {
    Value::Map(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::json!(v)))
            .collect(),
    )
}

fn insert_span(
    store: &InMemoryTelemetryStore,
    trace_id: &str,
    span_id: &str,
    name: &str,
    start_time: &str,
    duration_ns: i64,
    resource_attrs: Value,
) {
    store
        .insert(
            Table::Spans,
            [
                ("trace_id", Value::from(trace_id)),
                ("span_id", Value::from(span_id)),
                ("name", Value::from(name)),
                ("start_time", Value::from(start_time)),
                ("duration_ns", Value::from(duration_ns)),
                ("resource_attrs", resource_attrs),
            ],
        )
        .unwrap();
}

fn insert_metric(
    store: &InMemoryTelemetryStore,
    name: &str,
    code: i64,
    value: f64,
    payload: Option<&str>,
    timestamp: &str,
) {
    store
        .insert(
            Table::Metrics,
            [
                ("name", Value::from(name)),
                ("type", Value::from(code)),
                ("value", Value::from(value)),
                ("histogram_payload", Value::from(payload)),
                ("resource_attrs", attrs(&[("service.name", "mo11y-test")])),
                ("timestamp", Value::from(timestamp)),
            ],
        )
        .unwrap();
}

fn insert_log(store: &InMemoryTelemetryStore, timestamp: &str, severity: &str, body: &str) {
    store
        .insert(
            Table::Logs,
            [
                ("timestamp", Value::from(timestamp)),
                ("severity_text", Value::from(severity)),
                ("body", Value::from(body)),
                ("resource_attrs", attrs(&[])),
            ],
        )
        .unwrap();
}

const EMPTY_TAIL: &str = "\
=== SPAN EVENTS ===
Total: 0 events

=== SPAN LINKS ===
Total: 0 links

=== LOGS ===
Total: 0 logs

=== METRICS ===
Total: 0 metrics
";

#[test]
fn test_single_span_report() {
    let store = InMemoryTelemetryStore::new();
    insert_span(
        &store,
        "abcdef1234567890",
        "1122334455667788",
        "op",
        "2024-01-15T10:30:00.000000000Z",
        1_500_000,
        attrs(&[]),
    );

    let (result, output) = report(&store);
    let outcome = result.unwrap();

    let expected = format!(
        "=== SPANS ===\n  [1] abcdef12/11223344: op (1.50ms)\nTotal: 1 spans\n\n{EMPTY_TAIL}"
    );
    assert_eq!(output, expected);
    assert_eq!(outcome.count(RecordKind::Span), 1);
    assert_eq!(outcome.total(), 1);
    assert!(!outcome.is_empty());
}

#[test]
fn test_span_service_name_line() {
    let store = InMemoryTelemetryStore::new();
    insert_span(
        &store,
        "abcdef1234567890",
        "1122334455667788",
        "GET /users",
        "2024-01-15T10:30:00Z",
        2_000_000,
        attrs(&[("service.name", "mo11y-test"), ("host.name", "node-1")]),
    );

    let (result, output) = report(&store);
    result.unwrap();

    assert!(output.starts_with(
        "=== SPANS ===\n  [1] abcdef12/11223344: GET /users (2.00ms)\n      service.name=mo11y-test\nTotal: 1 spans\n"
    ));
}

#[test]
fn test_spans_rendered_in_start_time_order() {
    let store = InMemoryTelemetryStore::new();
    insert_span(
        &store,
        "bbbbbbbbbbbbbbbb",
        "2222222222222222",
        "second",
        "2024-01-15T10:30:02Z",
        0,
        Value::Null,
    );
    insert_span(
        &store,
        "aaaaaaaaaaaaaaaa",
        "1111111111111111",
        "first",
        "2024-01-15T10:30:01Z",
        0,
        Value::Null,
    );

    let (result, output) = report(&store);
    result.unwrap();

    assert!(output.contains("  [1] aaaaaaaa/11111111: first (0.00ms)\n"));
    assert!(output.contains("  [2] bbbbbbbb/22222222: second (0.00ms)\n"));
}

#[test]
fn test_histogram_with_short_payload() {
    let store = InMemoryTelemetryStore::new();
    let payload = "{\"count\":3,\"sum\":65.8,\"b\":[1]}";
    assert_eq!(payload.len(), 30);
    insert_metric(
        &store,
        "request_duration_ms",
        3,
        0.0,
        Some(payload),
        "2024-01-15T10:30:00Z",
    );

    let (result, output) = report(&store);
    result.unwrap();

    assert!(output.contains(&format!(
        "  [1] request_duration_ms (Histogram): {payload}...\n"
    )));
    assert!(output.ends_with("Total: 1 metrics\n"));
}

#[test]
fn test_histogram_with_long_payload() {
    let store = InMemoryTelemetryStore::new();
    let payload = "0123456789".repeat(8);
    insert_metric(
        &store,
        "request_duration_ms",
        3,
        0.0,
        Some(&payload),
        "2024-01-15T10:30:00Z",
    );

    let (result, output) = report(&store);
    result.unwrap();

    assert!(output.contains(&format!(
        "  [1] request_duration_ms (Histogram): {}...\n",
        &payload[..50]
    )));
}

#[test]
fn test_metrics_section() {
    let store = InMemoryTelemetryStore::new();
    insert_metric(&store, "requests_total", 2, 55.0, None, "2024-01-15T10:30:01Z");
    insert_metric(&store, "temperature_celsius", 1, 23.5, None, "2024-01-15T10:30:00Z");

    let (result, output) = report(&store);
    let outcome = result.unwrap();

    assert!(output.ends_with(
        "=== METRICS ===\n  [1] temperature_celsius (Gauge): 23.50\n  [2] requests_total (Sum): 55.00\nTotal: 2 metrics\n"
    ));
    assert_eq!(outcome.count(RecordKind::Metric), 2);
}

#[test]
fn test_logs_section() {
    let store = InMemoryTelemetryStore::new();
    insert_log(&store, "2024-01-15T10:30:01.500000000Z", "ERROR", "payment failed");
    insert_log(&store, "2024-01-15T10:30:00.250000000Z", "INFO", "user logged in");

    let (result, output) = report(&store);
    result.unwrap();

    assert!(output.contains(
        "=== LOGS ===\n  [1] 2024-01-15T10:30:00 INFO: user logged in\n  [2] 2024-01-15T10:30:01 ERROR: payment failed\nTotal: 2 logs\n"
    ));
}

#[test]
fn test_events_and_links_sections() {
    let store = InMemoryTelemetryStore::new();
    store
        .insert(
            Table::SpanEvents,
            [
                ("trace_id", "abcdef1234567890"),
                ("span_id", "1122334455667788"),
                ("event_name", "cache miss"),
                ("event_time", "2024-01-15T10:30:00Z"),
            ],
        )
        .unwrap();
    store
        .insert(
            Table::SpanLinks,
            [
                ("trace_id", "abcdef1234567890"),
                ("span_id", "1122334455667788"),
                ("linked_trace_id", "fedcba0987654321"),
                ("linked_span_id", "8877665544332211"),
            ],
        )
        .unwrap();

    let (result, output) = report(&store);
    let outcome = result.unwrap();

    assert!(output.contains(
        "=== SPAN EVENTS ===\n  [1] abcdef12/11223344: cache miss\nTotal: 1 events\n"
    ));
    assert!(output.contains(
        "=== SPAN LINKS ===\n  [1] abcdef12/11223344 -> fedcba09/88776655\nTotal: 1 links\n"
    ));
    assert_eq!(outcome.count(RecordKind::SpanEvent), 1);
    assert_eq!(outcome.count(RecordKind::SpanLink), 1);
}

#[test]
fn test_only_links_is_not_empty() {
    let store = InMemoryTelemetryStore::new();
    store
        .insert(
            Table::SpanLinks,
            [
                ("trace_id", "abcdef1234567890"),
                ("span_id", "1122334455667788"),
                ("linked_trace_id", "fedcba0987654321"),
                ("linked_span_id", "8877665544332211"),
            ],
        )
        .unwrap();

    let (result, _) = report(&store);

    assert!(!result.unwrap().is_empty());
}

#[test]
fn test_counters_match_streamed_records() {
    let store = InMemoryTelemetryStore::new();
    for i in 0..7 {
        insert_log(&store, &format!("2024-01-15T10:30:0{i}Z"), "INFO", "tick");
    }
    for i in 0..3_i32 {
        insert_metric(&store, "ticks", 2, f64::from(i), None, "2024-01-15T10:30:00Z");
    }

    let (result, output) = report(&store);
    let outcome = result.unwrap();

    assert_eq!(outcome.count(RecordKind::Log), 7);
    assert_eq!(outcome.count(RecordKind::Metric), 3);
    assert_eq!(outcome.count(RecordKind::Span), 0);
    assert!(output.contains("  [7] 2024-01-15T10:30:06 INFO: tick\nTotal: 7 logs\n"));
}

#[test]
fn test_missing_histogram_payload_aborts() {
    let store = InMemoryTelemetryStore::new();
    insert_span(
        &store,
        "abcdef1234567890",
        "1122334455667788",
        "op",
        "2024-01-15T10:30:00Z",
        1,
        Value::Null,
    );
    insert_metric(&store, "request_duration_ms", 3, 0.0, None, "2024-01-15T10:30:00Z");

    let (result, output) = report(&store);

    match result {
        Err(ReportError::Decode {
            section,
            seq,
            source: DecodeError::MissingHistogramPayload { name },
        }) => {
            assert_eq!(section, "metrics");
            assert_eq!(seq, 1);
            assert_eq!(name, "request_duration_ms");
        }
        other => panic!("expected MissingHistogramPayload, got {other:?}"),
    }
    assert!(!output.contains("Total: 1 metrics"));
}

#[test]
fn test_unknown_metric_type_aborts() {
    let store = InMemoryTelemetryStore::new();
    insert_metric(&store, "mystery", 9, 1.0, None, "2024-01-15T10:30:00Z");

    let (result, _) = report(&store);

    assert!(matches!(
        result,
        Err(ReportError::Decode {
            source: DecodeError::UnknownMetricType(_),
            ..
        })
    ));
}

#[test]
fn test_short_identifier_aborts_before_later_sections() {
    let store = InMemoryTelemetryStore::new();
    insert_span(
        &store,
        "abc",
        "1122334455667788",
        "op",
        "2024-01-15T10:30:00Z",
        1,
        Value::Null,
    );
    insert_log(&store, "2024-01-15T10:30:00Z", "INFO", "never printed");

    let (result, output) = report(&store);

    assert!(matches!(
        result,
        Err(ReportError::Render {
            section: "spans",
            seq: 1,
            source: RenderError::MalformedIdentifier { .. },
        })
    ));
    assert!(!output.contains("=== LOGS ==="));
}

#[test]
fn test_all_sections_empty() {
    let store = InMemoryTelemetryStore::new();

    let (result, output) = report(&store);
    let outcome = result.unwrap();

    assert_eq!(
        output,
        format!("=== SPANS ===\nTotal: 0 spans\n\n{EMPTY_TAIL}")
    );
    assert_eq!(output.matches("===").count(), 10);
    assert!(outcome.is_empty());
    assert_eq!(outcome.total(), 0);
}

/// A store that fails on one table and records which tables were queried.
struct FailingStore {
    fail_on: Table,
    queried: Mutex<Vec<Table>>,
}

impl FailingStore {
    fn new(fail_on: Table) -> Self {
        Self {
            fail_on,
            queried: Mutex::new(Vec::new()),
        }
    }
}

impl TelemetryStore for FailingStore {
    fn query(&self, table: Table) -> Result<RowStream<'_>, StoreError> {
        self.queried.lock().unwrap().push(table);
        if table == self.fail_on {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(Box::new(std::iter::empty()))
    }

    fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[test]
fn test_store_failure_aborts_report() {
    let store = FailingStore::new(Table::Logs);

    let (result, output) = report(&store);

    assert!(matches!(
        result,
        Err(ReportError::StoreUnavailable {
            section: "logs",
            source: StoreError::Unavailable(_),
        })
    ));
    assert_eq!(
        *store.queried.lock().unwrap(),
        vec![Table::Spans, Table::SpanEvents, Table::SpanLinks, Table::Logs]
    );
    assert!(!output.contains("=== METRICS ==="));
}

/// A store whose stream fails part-way through.
struct TimeoutStore;

impl TelemetryStore for TimeoutStore {
    fn query(&self, table: Table) -> Result<RowStream<'_>, StoreError> {
        let row = RawRow::new(vec![
            "abcdef1234567890".into(),
            "1122334455667788".into(),
            "cache miss".into(),
            "2024-01-15T10:30:00Z".into(),
        ]);
        let rows: Vec<Result<RawRow, StoreError>> = match table {
            Table::SpanEvents => vec![
                Ok(row),
                Err(StoreError::Timeout {
                    table,
                    after: std::time::Duration::from_secs(30),
                }),
            ],
            _ => Vec::new(),
        };
        Ok(Box::new(rows.into_iter()))
    }

    fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[test]
fn test_timeout_mid_stream_aborts_report() {
    let (result, output) = report(&TimeoutStore);

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        ReportError::StoreUnavailable {
            section: "events",
            source: StoreError::Timeout { .. },
        }
    ));
    assert!(err.to_string().contains("timed out after 30s"));
    assert!(output.contains("  [1] abcdef12/11223344: cache miss\n"));
    assert!(!output.contains("Total: 1 events"));
}

/// Tracks how many row streams are alive at once.
struct CountingStore {
    inner: InMemoryTelemetryStore,
    open: Arc<AtomicUsize>,
    max_open: Arc<AtomicUsize>,
}

struct TrackedStream<'a> {
    inner: RowStream<'a>,
    open: Arc<AtomicUsize>,
}

impl Iterator for TrackedStream<'_> {
    type Item = Result<RawRow, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl Drop for TrackedStream<'_> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TelemetryStore for CountingStore {
    fn query(&self, table: Table) -> Result<RowStream<'_>, StoreError> {
        let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(now_open, Ordering::SeqCst);
        Ok(Box::new(TrackedStream {
            inner: self.inner.query(table)?,
            open: Arc::clone(&self.open),
        }))
    }

    fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping()
    }
}

#[test]
fn test_one_open_stream_at_a_time() {
    let inner = InMemoryTelemetryStore::new();
    insert_log(&inner, "2024-01-15T10:30:00Z", "INFO", "hello");
    insert_metric(&inner, "ticks", 2, 1.0, None, "2024-01-15T10:30:00Z");

    let store = CountingStore {
        inner,
        open: Arc::new(AtomicUsize::new(0)),
        max_open: Arc::new(AtomicUsize::new(0)),
    };

    let (result, _) = report(&store);
    result.unwrap();

    assert_eq!(store.max_open.load(Ordering::SeqCst), 1);
    assert_eq!(store.open.load(Ordering::SeqCst), 0);
}

/// A writer that always fails.
struct BrokenPipe;

impl std::io::Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "closed",
        ))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_write_failure_is_output_error() {
    let store = InMemoryTelemetryStore::new();

    let result = run_report(&store, &mut BrokenPipe);

    assert!(matches!(result, Err(ReportError::Output(_))));
}

/// Collects formatted log output.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_empty_report_logs_nothing_at_warn() {
    let captured = CapturedLogs::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(move || writer.clone())
        .finish();
    let store = InMemoryTelemetryStore::new();

    let (result, _) = tracing::subscriber::with_default(subscriber, || report(&store));

    assert!(result.unwrap().is_empty());
    assert!(captured.0.lock().unwrap().is_empty());
}
