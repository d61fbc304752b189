//! SQL query observability
//!
//! The data-access layer reports every executed query to a
//! [`QueryObserver`], which picks at most one log channel for it:
//! failed queries at error, slow queries at warn, everything else at info,
//! each gated by the configured [`QueryLogLevel`]. The observer never fails
//! the query path; a broken query is just another record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::logging::{LogSink, Severity};

/// How much the query observer records
///
/// Ordered: every level includes the ones below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryLogLevel {
    Silent = 1,
    Error = 2,
    Warn = 3,
    Info = 4,
}

impl QueryLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for QueryLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported for a query
pub trait TraceError: std::error::Error {
    /// The "no rows found" sentinel, which is not worth an error record
    fn is_record_not_found(&self) -> bool {
        false
    }
}

/// Row count of a query outcome
pub trait AffectedRows {
    fn affected_rows(&self) -> i64;
}

impl<T> AffectedRows for Vec<T> {
    fn affected_rows(&self) -> i64 {
        i64::try_from(self.len()).unwrap_or(i64::MAX)
    }
}

impl<T> AffectedRows for Option<T> {
    fn affected_rows(&self) -> i64 {
        i64::from(self.is_some())
    }
}

/// One executed query, as seen by the router
#[derive(Clone, Copy)]
pub struct QueryTrace<'a> {
    pub sql: &'a str,
    /// -1 when unknown
    pub rows_affected: i64,
    pub elapsed: Duration,
    pub err: Option<&'a dyn TraceError>,
    pub level: QueryLogLevel,
    /// Whole seconds, negative disables slow query detection
    pub slow_threshold: i64,
}

/// The single record a trace was routed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    pub severity: Severity,
    pub message: String,
}

/// Which channel a query outcome lands in, if any
///
/// First match wins: error, then slow query, then plain info.
pub fn classify(
    elapsed: Duration,
    err: Option<&dyn TraceError>,
    level: QueryLogLevel,
    slow_threshold: i64,
) -> Option<Severity> {
    if level <= QueryLogLevel::Silent {
        return None;
    }

    let is_error = err.is_some_and(|e| !e.is_record_not_found());
    let elapsed_secs = i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX);

    if is_error && level >= QueryLogLevel::Error {
        Some(Severity::Error)
    } else if slow_threshold >= 0 && elapsed_secs > slow_threshold && level >= QueryLogLevel::Warn
    {
        Some(Severity::Warn)
    } else if level == QueryLogLevel::Info {
        Some(Severity::Info)
    } else {
        None
    }
}

/// Route a trace to its record, tagging it with `caller`
pub fn route(trace: &QueryTrace<'_>, caller: &Location<'_>) -> Option<QueryRecord> {
    let severity = classify(trace.elapsed, trace.err, trace.level, trace.slow_threshold)?;
    let ms = trace.elapsed.as_nanos() as f64 / 1e6;

    let message = match (severity, trace.err) {
        (Severity::Error, Some(err)) => format!(
            "[exec:{}] [{:.3}ms] [rows:{}] [err: {}] SQL: {}",
            caller, ms, trace.rows_affected, err, trace.sql
        ),
        (Severity::Warn, _) => format!(
            "[exec:{}] [{:.3}ms] [rows:{}] [warn: SLOW SQL >= {}s] SQL: {}",
            caller, ms, trace.rows_affected, trace.slow_threshold, trace.sql
        ),
        _ => format!(
            "[exec:{}] [{:.3}ms] [rows:{}] SQL: {}",
            caller, ms, trace.rows_affected, trace.sql
        ),
    };

    Some(QueryRecord { severity, message })
}

/// Query observer handed to the data-access layer
#[derive(Clone)]
pub struct QueryObserver {
    sink: Arc<dyn LogSink>,
    level: QueryLogLevel,
    slow_threshold: i64,
}

impl QueryObserver {
    pub fn new(sink: Arc<dyn LogSink>, level: QueryLogLevel, slow_threshold: i64) -> Self {
        Self {
            sink,
            level,
            slow_threshold,
        }
    }

    pub fn level(&self) -> QueryLogLevel {
        self.level
    }

    pub fn slow_threshold(&self) -> i64 {
        self.slow_threshold
    }

    /// Copy of this observer with a different level
    pub fn with_level(&self, level: QueryLogLevel) -> Self {
        Self {
            level,
            ..self.clone()
        }
    }

    /// Called once per executed query
    ///
    /// `fc` supplies the SQL text and affected rows; it only runs when the
    /// query is actually recorded.
    #[track_caller]
    pub fn trace<F>(&self, begin: Instant, fc: F, err: Option<&dyn TraceError>)
    where
        F: FnOnce() -> (String, i64),
    {
        self.trace_elapsed(begin.elapsed(), fc, err);
    }

    /// [`Self::trace`] with a precomputed duration
    #[track_caller]
    pub fn trace_elapsed<F>(&self, elapsed: Duration, fc: F, err: Option<&dyn TraceError>)
    where
        F: FnOnce() -> (String, i64),
    {
        let caller = Location::caller();
        if classify(elapsed, err, self.level, self.slow_threshold).is_none() {
            return;
        }

        let (sql, rows_affected) = fc();
        self.record_at(caller, elapsed, &sql, rows_affected, err);
    }

    /// Time `query`, record its outcome and hand the result back untouched
    #[track_caller]
    pub fn observe<'a, T, E, F>(
        &'a self,
        sql: &'a str,
        query: F,
    ) -> impl Future<Output = Result<T, E>> + 'a
    where
        F: Future<Output = Result<T, E>> + 'a,
        T: AffectedRows + 'a,
        E: TraceError + 'a,
    {
        let caller = Location::caller();
        async move {
            let begin = Instant::now();
            let result = query.await;
            let elapsed = begin.elapsed();

            let (rows, err) = match &result {
                Ok(value) => (value.affected_rows(), None),
                Err(e) => (-1, Some(e as &dyn TraceError)),
            };
            self.record_at(caller, elapsed, sql, rows, err);

            result
        }
    }

    #[track_caller]
    pub fn info(&self, message: &str) {
        self.message(QueryLogLevel::Info, Severity::Info, message);
    }

    #[track_caller]
    pub fn warn(&self, message: &str) {
        self.message(QueryLogLevel::Warn, Severity::Warn, message);
    }

    #[track_caller]
    pub fn error(&self, message: &str) {
        self.message(QueryLogLevel::Error, Severity::Error, message);
    }

    #[track_caller]
    fn message(&self, required: QueryLogLevel, severity: Severity, message: &str) {
        if self.level >= required {
            let caller = Location::caller();
            self.sink
                .log(severity, &format!("[exec:{}] {}", caller, message));
        }
    }

    fn record_at(
        &self,
        caller: &Location<'_>,
        elapsed: Duration,
        sql: &str,
        rows_affected: i64,
        err: Option<&dyn TraceError>,
    ) {
        let trace = QueryTrace {
            sql,
            rows_affected,
            elapsed,
            err,
            level: self.level,
            slow_threshold: self.slow_threshold,
        };
        if let Some(record) = route(&trace, caller) {
            self.sink.log(record.severity, &record.message);
        }
    }
}
