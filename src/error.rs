use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The work path could not be determined
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("get application work path error: {0}")]
    CurrentDir(#[source] io::Error),
    #[error("get application executable path error: {0}")]
    Executable(#[source] io::Error),
    #[error("executable path `{0}` has no parent directory")]
    NoParent(PathBuf),
}

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Creating, reading or writing the file (or its directory) failed
    #[error("config file `{path}` io error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// File content does not fit the configuration schema
    #[error("config file `{path}` map to struct error: {source}")]
    Mapping {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    /// Values parsed but cannot be used
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The log engine could not be brought up
#[derive(Debug, Error)]
pub enum LogInitError {
    #[error("create log dir `{path}` error: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("open log file in `{path}` error: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid log filter `{directive}`: {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("install global log dispatcher error: {0}")]
    Install(#[from] tracing::dispatcher::SetGlobalDefaultError),
}

/// Any failure during startup; all of them abort the process
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Log(#[from] LogInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfigError::Io {
            path: PathBuf::from("/tmp/bedisk.toml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            error.to_string(),
            "config file `/tmp/bedisk.toml` io error: denied"
        );
    }

    #[test]
    fn test_startup_error_is_transparent() {
        let error: StartupError = EnvError::NoParent(PathBuf::from("/")).into();
        assert_eq!(error.to_string(), "executable path `/` has no parent directory");
    }
}
