//! Runtime mode and work path resolution

use std::path::PathBuf;

use crate::error::EnvError;

/// Environment variable selecting development mode
pub const DEV_MODE_ENV: &str = "BEDISK_IS_DEV";

/// Process-wide runtime facts, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeState {
    /// Development mode mirrors logs to the console and works from the
    /// invocation directory
    pub is_dev_mode: bool,
    /// Base directory for the config file and default log directory
    pub work_path: PathBuf,
}

impl RuntimeState {
    /// Resolve from the process environment
    pub fn resolve() -> Result<Self, EnvError> {
        let signal = std::env::var(DEV_MODE_ENV).ok();
        Self::from_signal(signal.as_deref())
    }

    /// Resolve from an explicit dev-mode signal value
    pub fn from_signal(signal: Option<&str>) -> Result<Self, EnvError> {
        let is_dev_mode = signal.is_some_and(is_truthy);

        let work_path = if is_dev_mode {
            std::env::current_dir().map_err(EnvError::CurrentDir)?
        } else {
            let exe = std::env::current_exe().map_err(EnvError::Executable)?;
            exe.parent()
                .map(PathBuf::from)
                .ok_or_else(|| EnvError::NoParent(exe.clone()))?
        };

        Ok(Self {
            is_dev_mode,
            work_path,
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
