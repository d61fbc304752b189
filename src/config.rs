//! Configuration model, defaults and file persistence
//!
//! Values are layered: hard-coded defaults first, then the TOML file, then
//! `BEDISK__<SECTION>__<KEY>` environment variables. The file only ever
//! overrides; a missing file is created empty and a missing key keeps its
//! default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::fs_utils;
use crate::observability::QueryLogLevel;

/// Config file name, relative to the work path
pub const CONFIG_FILE_NAME: &str = "bedisk.toml";

/// Prefix of environment overrides, e.g. `BEDISK__HTTP_SERVE__PORT`
pub const ENV_PREFIX: &str = "BEDISK";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub app: AppConfig,
    pub http_serve: HttpServeConfig,
    pub log: LogConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    /// Service name, also the log file prefix
    pub name: String,
    /// Default `tracing` filter directive when `RUST_LOG` is unset
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HttpServeConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogConfig {
    pub dir_path: PathBuf,
    /// Days of log files to keep (0 keeps everything)
    pub save_day: u32,
    /// Max size of one log file segment in MB (0 disables the limit)
    pub max_size_mb: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub charset: String,
    /// Query observer level
    pub log_level: QueryLogLevel,
    /// Slow query threshold in whole seconds, negative disables
    pub slow_threshold: i64,
}

impl Config {
    /// Hard-coded defaults, assigned before any file is read
    pub fn defaults(work_path: &Path) -> Self {
        Self {
            app: AppConfig {
                name: "bedisk".to_string(),
                log_level: "info".to_string(),
            },
            http_serve: HttpServeConfig {
                host: "0.0.0.0".to_string(),
                port: 18018,
            },
            log: LogConfig {
                dir_path: work_path.join("logs"),
                save_day: 30,
                max_size_mb: 128,
            },
            database: DatabaseConfig {
                host: "127.0.0.1".to_string(),
                port: 3306,
                name: "bedisk".to_string(),
                user: "root".to_string(),
                password: "root".to_string(),
                charset: "utf8mb4".to_string(),
                log_level: QueryLogLevel::Info,
                slow_threshold: 1,
            },
        }
    }
}

/// Default config file location for a work path
pub fn config_path(work_path: &Path) -> PathBuf {
    work_path.join(CONFIG_FILE_NAME)
}

/// One entry of the declared field table
pub struct Field {
    pub section: &'static str,
    pub key: &'static str,
    pub description: &'static str,
    pub get: fn(&Config) -> toml::Value,
}

/// Sections in file order, with their descriptions
pub const SECTIONS: &[(&str, &str)] = &[
    ("app", "Application"),
    ("http_serve", "HTTP service"),
    ("log", "Log files"),
    ("database", "MySQL database"),
];

/// Every persisted key; the file is rendered by walking this table
pub const FIELDS: &[Field] = &[
    Field {
        section: "app",
        key: "name",
        description: "Service name, also used as the log file prefix",
        get: |c| toml::Value::String(c.app.name.clone()),
    },
    Field {
        section: "app",
        key: "log_level",
        description: "Log filter when RUST_LOG is unset (e.g. info, bedisk=debug)",
        get: |c| toml::Value::String(c.app.log_level.clone()),
    },
    Field {
        section: "http_serve",
        key: "host",
        description: "HTTP listen address",
        get: |c| toml::Value::String(c.http_serve.host.clone()),
    },
    Field {
        section: "http_serve",
        key: "port",
        description: "HTTP listen port",
        get: |c| toml::Value::Integer(i64::from(c.http_serve.port)),
    },
    Field {
        section: "log",
        key: "dir_path",
        description: "Directory holding the log files",
        get: |c| toml::Value::String(c.log.dir_path.to_string_lossy().into_owned()),
    },
    Field {
        section: "log",
        key: "save_day",
        description: "Days to keep log files (0 keeps everything)",
        get: |c| toml::Value::Integer(i64::from(c.log.save_day)),
    },
    Field {
        section: "log",
        key: "max_size_mb",
        description: "Max size of a single log file in MB (0 disables the limit)",
        get: |c| toml::Value::Integer(i64::from(c.log.max_size_mb)),
    },
    Field {
        section: "database",
        key: "host",
        description: "Database host",
        get: |c| toml::Value::String(c.database.host.clone()),
    },
    Field {
        section: "database",
        key: "port",
        description: "Database port",
        get: |c| toml::Value::Integer(i64::from(c.database.port)),
    },
    Field {
        section: "database",
        key: "name",
        description: "Database name",
        get: |c| toml::Value::String(c.database.name.clone()),
    },
    Field {
        section: "database",
        key: "user",
        description: "Database user",
        get: |c| toml::Value::String(c.database.user.clone()),
    },
    Field {
        section: "database",
        key: "password",
        description: "Database password",
        get: |c| toml::Value::String(c.database.password.clone()),
    },
    Field {
        section: "database",
        key: "charset",
        description: "Connection charset",
        get: |c| toml::Value::String(c.database.charset.clone()),
    },
    Field {
        section: "database",
        key: "log_level",
        description: "SQL log level: silent, error, warn or info",
        get: |c| toml::Value::String(c.database.log_level.as_str().to_string()),
    },
    Field {
        section: "database",
        key: "slow_threshold",
        description: "Slow SQL threshold in seconds (negative disables)",
        get: |c| toml::Value::Integer(c.database.slow_threshold),
    },
];

/// Load the config file at `path` over `defaults`
///
/// Creates the file (and its directory) when it does not exist yet.
pub fn load(path: &Path, defaults: &Config) -> Result<Config, ConfigError> {
    ensure_file(path)?;

    let mapping = |source: config::ConfigError| ConfigError::Mapping {
        path: path.to_path_buf(),
        source,
    };
    let content = fs::read_to_string(path).map_err(|source| {
        // Not UTF-8: the file is there but its content is unusable
        if source.kind() == io::ErrorKind::InvalidData {
            mapping(config::ConfigError::Foreign(Box::new(source)))
        } else {
            io_error(path, source)
        }
    })?;

    let layered = config::Config::builder()
        .add_source(config::Config::try_from(defaults).map_err(mapping)?)
        .add_source(config::File::from_str(&content, config::FileFormat::Toml))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(mapping)?;

    let cfg: Config = layered.try_deserialize().map_err(mapping)?;
    validate(&cfg)?;

    Ok(cfg)
}

/// Write the full configuration to `path`, replacing the file
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = parent_dir(path) {
        fs_utils::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    fs::write(path, render(config)).map_err(|source| io_error(path, source))
}

/// Render the configuration as commented TOML
pub fn render(config: &Config) -> String {
    let mut out = String::from("# bedisk configuration\n");

    for (section, description) in SECTIONS {
        out.push_str(&format!("\n# {}\n[{}]\n", description, section));
        for field in FIELDS.iter().filter(|f| f.section == *section) {
            out.push_str(&format!(
                "# {}\n{} = {}\n",
                field.description,
                field.key,
                (field.get)(config)
            ));
        }
    }

    out
}

/// Reject values the rest of the bootstrap cannot work with
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let invalid = |reason: String| Err(ConfigError::Invalid(reason));

    if config.app.name.is_empty() {
        return invalid("app.name cannot be empty".to_string());
    }
    if config
        .app
        .name
        .chars()
        .any(|ch| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'))
    {
        return invalid(format!(
            "app.name '{}' may only contain letters, digits, '-' and '_'",
            config.app.name
        ));
    }
    if config.http_serve.port == 0 {
        return invalid("http_serve.port must be > 0".to_string());
    }
    if config.log.dir_path.as_os_str().is_empty() {
        return invalid("log.dir_path cannot be empty".to_string());
    }
    if config.database.charset.is_empty() {
        return invalid("database.charset cannot be empty".to_string());
    }

    Ok(())
}

fn ensure_file(path: &Path) -> Result<(), ConfigError> {
    match fs::metadata(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = parent_dir(path) {
                fs_utils::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
            }
            fs::File::create(path)
                .map(|_| ())
                .map_err(|source| io_error(path, source))
        }
        Err(source) => Err(io_error(path, source)),
    }
}

fn parent_dir(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

fn io_error(path: &Path, source: io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}
