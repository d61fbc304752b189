use bedisk::logging::{LogSink, Severity};
use bedisk::observability::{QueryLogLevel, QueryObserver, TraceError};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct DbError(&'static str);

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for DbError {}

impl TraceError for DbError {
    fn is_record_not_found(&self) -> bool {
        self.0 == "record not found"
    }
}

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<(Severity, String)>>,
}

impl LogSink for MemorySink {
    fn log(&self, severity: Severity, message: &str) {
        self.records
            .lock()
            .unwrap()
            .push((severity, message.to_string()));
    }
}

fn observer(level: QueryLogLevel, threshold: i64) -> (QueryObserver, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::default());
    (QueryObserver::new(sink.clone(), level, threshold), sink)
}

fn records(sink: &MemorySink) -> Vec<(Severity, String)> {
    sink.records.lock().unwrap().clone()
}

#[test]
fn test_slow_query_at_warn_level() {
    let (observer, sink) = observer(QueryLogLevel::Warn, 1);

    observer.trace_elapsed(
        Duration::from_secs(3),
        || ("SELECT * FROM files".to_string(), 12),
        None,
    );

    let records = records(&sink);
    assert_eq!(records.len(), 1);
    let (severity, message) = &records[0];
    assert_eq!(*severity, Severity::Warn);
    assert!(message.contains("[3000.000ms]"));
    assert!(message.contains("[rows:12]"));
    assert!(message.contains("[warn: SLOW SQL >= 1s]"));
    assert!(message.ends_with("SQL: SELECT * FROM files"));
}

#[test]
fn test_failed_slow_query_is_one_error_record() {
    let (observer, sink) = observer(QueryLogLevel::Error, 1);
    let err = DbError("connection reset");

    observer.trace_elapsed(
        Duration::from_secs(5),
        || ("UPDATE disks SET used = used + 1".to_string(), 0),
        Some(&err),
    );

    let records = records(&sink);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, Severity::Error);
    assert!(records[0].1.contains("[err: connection reset]"));
    assert!(!records[0].1.contains("SLOW SQL"));
}

#[test]
fn test_record_not_found_falls_through_to_info() {
    let (observer, sink) = observer(QueryLogLevel::Info, 1);
    let err = DbError("record not found");

    observer.trace_elapsed(
        Duration::from_millis(2),
        || ("SELECT * FROM disks WHERE id = 9".to_string(), 0),
        Some(&err),
    );

    let records = records(&sink);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, Severity::Info);
    assert!(!records[0].1.contains("err:"));
}

#[test]
fn test_negative_threshold_disables_slow_detection() {
    let (observer, sink) = observer(QueryLogLevel::Warn, -1);

    observer.trace_elapsed(
        Duration::from_secs(3600),
        || unreachable!("nothing should be recorded"),
        None,
    );

    assert!(records(&sink).is_empty());
}

#[test]
fn test_silent_records_nothing() {
    let (observer, sink) = observer(QueryLogLevel::Silent, 0);
    let err = DbError("connection reset");

    observer.trace_elapsed(Duration::from_secs(10), || unreachable!(), Some(&err));
    observer.error("pool exhausted");

    assert!(records(&sink).is_empty());
}

#[test]
fn test_caller_location_is_the_call_site() {
    let (observer, sink) = observer(QueryLogLevel::Info, 1);

    observer.trace_elapsed(Duration::ZERO, || ("SELECT 1".to_string(), 1), None);

    let records = records(&sink);
    assert!(records[0].1.starts_with("[exec:tests/query_routing.rs:"));
}

#[tokio::test]
async fn test_observe_returns_query_error_unchanged() {
    let (observer, sink) = observer(QueryLogLevel::Error, 1);

    let result: Result<Vec<u32>, DbError> = observer
        .observe("DELETE FROM disks", async { Err(DbError("deadlock found")) })
        .await;

    assert_eq!(result.unwrap_err().0, "deadlock found");
    let records = records(&sink);
    assert_eq!(records.len(), 1);
    assert!(records[0].1.contains("[rows:-1] [err: deadlock found]"));
}
