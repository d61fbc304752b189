//! MySQL connection settings and the sqlx side of query observation

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlQueryResult};

use crate::config::DatabaseConfig;
use crate::observability::{AffectedRows, TraceError};

const MAX_CONNECTIONS: u32 = 10;

pub fn connect_options(cfg: &DatabaseConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.name)
        .charset(&cfg.charset)
}

/// Pool that connects on first use
///
/// Must be called from within a tokio runtime.
pub fn connect_lazy(cfg: &DatabaseConfig) -> MySqlPool {
    MySqlPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_lazy_with(connect_options(cfg))
}

/// Connection string safe for logs
pub fn redacted_dsn(cfg: &DatabaseConfig) -> String {
    format!(
        "mysql://{}:***@{}:{}/{}?charset={}",
        cfg.user, cfg.host, cfg.port, cfg.name, cfg.charset
    )
}

impl TraceError for sqlx::Error {
    fn is_record_not_found(&self) -> bool {
        matches!(self, sqlx::Error::RowNotFound)
    }
}

impl AffectedRows for MySqlQueryResult {
    fn affected_rows(&self) -> i64 {
        i64::try_from(self.rows_affected()).unwrap_or(i64::MAX)
    }
}
