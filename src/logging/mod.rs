//! Log engine
//!
//! A rolling file sink (always on) plus a console mirror in development
//! mode, both behind one `tracing` dispatcher. The file sink is fed by a
//! single non-blocking worker so records from concurrent callers never
//! interleave.

pub mod rolling;

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use tracing::Dispatch;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{fmt::time::ChronoLocal, layer::SubscriberExt, EnvFilter};

use crate::config::Config;
use crate::env::RuntimeState;
use crate::error::LogInitError;
use crate::fs_utils;
use rolling::{RollingOptions, RollingWriter, SharedRollingWriter};

/// Target used for records written through a [`LogHandle`]
pub const LOG_TARGET: &str = "bedisk";

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    /// Written at error level with `fatal = true`
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that accepts formatted log records
pub trait LogSink: Send + Sync {
    fn log(&self, severity: Severity, message: &str);
}

/// Open the log engine for the given configuration and runtime mode
pub fn open(config: &Config, runtime: &RuntimeState) -> Result<LogHandle, LogInitError> {
    let dir = config.log.dir_path.clone();
    fs_utils::create_dir_all(&dir).map_err(|source| LogInitError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let options = RollingOptions {
        dir: dir.clone(),
        prefix: config.app.name.clone(),
        max_bytes: u64::from(config.log.max_size_mb) * BYTES_PER_MB,
        retention_days: config.log.save_day,
    };
    let file = RollingWriter::open(options)
        .map(SharedRollingWriter::new)
        .map_err(|source| LogInitError::OpenFile { path: dir, source })?;

    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.app.log_level))
        .map_err(|source| LogInitError::Filter {
            directive: config.app.log_level.clone(),
            source,
        })?;

    // Non-lossy: callers wait rather than drop records when the queue is full
    let (file_writer, guard) = NonBlockingBuilder::default()
        .lossy(false)
        .thread_name("bedisk-log")
        .finish(file.clone());

    // Local time, the same clock the file rotation runs on. The source
    // location is carried by the `caller` field.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_timer(ChronoLocal::rfc_3339())
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true);

    let console_layer = runtime.is_dev_mode.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_timer(ChronoLocal::rfc_3339())
            .with_ansi(true)
            .compact()
            .with_target(true)
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);

    Ok(LogHandle {
        dispatch: Dispatch::new(subscriber),
        file,
        console: runtime.is_dev_mode,
        _guard: guard,
    })
}

/// Handle to an open log engine
///
/// Dropping the handle flushes pending records to disk.
pub struct LogHandle {
    dispatch: Dispatch,
    file: SharedRollingWriter,
    console: bool,
    _guard: WorkerGuard,
}

impl LogHandle {
    /// Write one record, tagged with the caller's source location
    #[track_caller]
    pub fn log(&self, severity: Severity, message: &str) {
        let caller = Location::caller();
        tracing::dispatcher::with_default(&self.dispatch, || emit(severity, caller, message));
    }

    #[track_caller]
    pub fn debug(&self, message: &str) {
        self.log(Severity::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    #[track_caller]
    pub fn warn(&self, message: &str) {
        self.log(Severity::Warn, message);
    }

    #[track_caller]
    pub fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }

    #[track_caller]
    pub fn fatal(&self, message: &str) {
        self.log(Severity::Fatal, message);
    }

    /// Make this engine the process-wide `tracing` default
    pub fn install(&self) -> Result<(), LogInitError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())?;
        Ok(())
    }

    /// Whether records are mirrored to stdout
    pub fn console_enabled(&self) -> bool {
        self.console
    }

    /// The physical file currently written to
    pub fn current_file(&self) -> PathBuf {
        self.file.current_path()
    }

    /// The stable reference to [`Self::current_file`]
    pub fn link_file(&self) -> PathBuf {
        self.file.link_path()
    }
}

impl LogSink for LogHandle {
    fn log(&self, severity: Severity, message: &str) {
        LogHandle::log(self, severity, message);
    }
}

fn emit(severity: Severity, caller: &Location<'_>, message: &str) {
    match severity {
        Severity::Debug => tracing::debug!(target: LOG_TARGET, %caller, "{}", message),
        Severity::Info => tracing::info!(target: LOG_TARGET, %caller, "{}", message),
        Severity::Warn => tracing::warn!(target: LOG_TARGET, %caller, "{}", message),
        Severity::Error => tracing::error!(target: LOG_TARGET, %caller, "{}", message),
        Severity::Fatal => {
            tracing::error!(target: LOG_TARGET, %caller, fatal = true, "{}", message)
        }
    }
}
