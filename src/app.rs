//! Application context
//!
//! Built once at startup and passed explicitly to whoever needs the runtime
//! mode, configuration, log engine or query observer.

use arc_swap::ArcSwap;
use sqlx::mysql::MySqlPool;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{self, Config};
use crate::database;
use crate::env::RuntimeState;
use crate::error::{ConfigError, StartupError};
use crate::logging::{self, LogHandle, LogSink};
use crate::observability::QueryObserver;

pub struct AppContext {
    runtime: RuntimeState,
    config_path: PathBuf,
    config: ArcSwap<Config>,
    log: Arc<LogHandle>,
    queries: QueryObserver,
}

impl AppContext {
    /// Resolve the runtime mode and bootstrap from it
    pub fn bootstrap(config_override: Option<PathBuf>) -> Result<Self, StartupError> {
        let runtime = RuntimeState::resolve()?;
        Self::bootstrap_with(runtime, config_override)
    }

    /// Load configuration, open the log engine and build the query observer
    ///
    /// Without an override the config file lives at `<work path>/bedisk.toml`.
    pub fn bootstrap_with(
        runtime: RuntimeState,
        config_override: Option<PathBuf>,
    ) -> Result<Self, StartupError> {
        let config_path =
            config_override.unwrap_or_else(|| config::config_path(&runtime.work_path));
        let defaults = Config::defaults(&runtime.work_path);
        let cfg = config::load(&config_path, &defaults)?;

        let log = Arc::new(logging::open(&cfg, &runtime)?);
        log.info("log engine init success");

        let sink: Arc<dyn LogSink> = log.clone();
        let queries = QueryObserver::new(
            sink,
            cfg.database.log_level,
            cfg.database.slow_threshold,
        );

        Ok(Self {
            runtime,
            config_path,
            config: ArcSwap::from_pointee(cfg),
            log,
            queries,
        })
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Current configuration snapshot
    pub fn config(&self) -> Arc<Config> {
        self.config.load_full()
    }

    pub fn log(&self) -> &LogHandle {
        &self.log
    }

    pub fn queries(&self) -> &QueryObserver {
        &self.queries
    }

    /// Apply `change` to a copy of the configuration and publish it
    ///
    /// Log and observer settings are read at bootstrap and are not affected.
    pub fn update_config<F>(&self, change: F)
    where
        F: FnOnce(&mut Config),
    {
        let mut next = Config::clone(&self.config.load());
        change(&mut next);
        self.config.store(Arc::new(next));
    }

    /// Persist the current configuration, replacing the file
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save(&self.config_path, &self.config.load())?;
        self.log.info("config file saved");
        Ok(())
    }

    /// Lazily connecting pool built from the current database settings
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_database(&self) -> MySqlPool {
        let cfg = self.config();
        self.queries.info(&format!(
            "mysql database is connecting: {}",
            database::redacted_dsn(&cfg.database)
        ));
        database::connect_lazy(&cfg.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn runtime(work_path: &Path, is_dev_mode: bool) -> RuntimeState {
        RuntimeState {
            is_dev_mode,
            work_path: work_path.to_path_buf(),
        }
    }

    #[test]
    fn test_bootstrap_creates_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = AppContext::bootstrap_with(runtime(temp_dir.path(), false), None).unwrap();

        assert_eq!(ctx.config_path(), temp_dir.path().join("bedisk.toml"));
        assert!(ctx.config_path().is_file());
        assert_eq!(ctx.config().http_serve.port, 18018);
        assert_eq!(ctx.config().log.dir_path, temp_dir.path().join("logs"));
        assert!(!ctx.log().console_enabled());
    }

    #[test]
    fn test_dev_mode_mirrors_to_console() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = AppContext::bootstrap_with(runtime(temp_dir.path(), true), None).unwrap();

        assert!(ctx.runtime().is_dev_mode);
        assert!(ctx.log().console_enabled());
    }

    #[test]
    fn test_config_override_path() {
        let temp_dir = TempDir::new().unwrap();
        let custom = temp_dir.path().join("etc").join("custom.toml");
        fs::create_dir_all(custom.parent().unwrap()).unwrap();
        fs::write(&custom, "[http_serve]\nport = 9090\n").unwrap();

        let ctx =
            AppContext::bootstrap_with(runtime(temp_dir.path(), false), Some(custom.clone()))
                .unwrap();

        assert_eq!(ctx.config_path(), custom.as_path());
        assert_eq!(ctx.config().http_serve.port, 9090);
        assert!(!temp_dir.path().join("bedisk.toml").exists());
    }

    #[test]
    fn test_update_then_save_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = AppContext::bootstrap_with(runtime(temp_dir.path(), false), None).unwrap();
        let before = ctx.config();

        ctx.update_config(|cfg| cfg.http_serve.port = 8080);
        assert_eq!(before.http_serve.port, 18018);
        assert_eq!(ctx.config().http_serve.port, 8080);

        ctx.save_config().unwrap();
        let reloaded = config::load(
            ctx.config_path(),
            &Config::defaults(temp_dir.path()),
        )
        .unwrap();
        assert_eq!(reloaded, *ctx.config());
    }

    #[test]
    fn test_observer_uses_database_settings() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("bedisk.toml"),
            "[database]\nlog_level = \"warn\"\nslow_threshold = 5\n",
        )
        .unwrap();

        let ctx = AppContext::bootstrap_with(runtime(temp_dir.path(), false), None).unwrap();
        assert_eq!(ctx.queries().level().to_string(), "warn");
        assert_eq!(ctx.queries().slow_threshold(), 5);
    }

    #[test]
    fn test_invalid_file_fails_bootstrap() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("bedisk.toml"),
            "[http_serve]\nport = \"not a number\"\n",
        )
        .unwrap();

        let result = AppContext::bootstrap_with(runtime(temp_dir.path(), false), None);
        assert!(matches!(result, Err(StartupError::Config(_))));
    }
}
