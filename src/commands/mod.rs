//! Command implementations for the CLI
//!
//! - start: Run the service until a shutdown signal
//! - test: Test configuration validity
//! - config: Configuration display, initialization and location

pub mod config;
pub mod start;

use anyhow::Result;
use bedisk::config::{self as config_store, Config};
use bedisk::env::RuntimeState;
use std::path::PathBuf;

/// Configuration as the service would see it, without opening the log engine
pub(crate) struct Loaded {
    pub runtime: RuntimeState,
    pub path: PathBuf,
    pub config: Config,
}

pub(crate) fn resolve_path(config_override: Option<PathBuf>) -> Result<(RuntimeState, PathBuf)> {
    let runtime = RuntimeState::resolve()?;
    let path = config_override.unwrap_or_else(|| config_store::config_path(&runtime.work_path));
    Ok((runtime, path))
}

pub(crate) fn load(config_override: Option<PathBuf>) -> Result<Loaded> {
    let (runtime, path) = resolve_path(config_override)?;
    let config = config_store::load(&path, &Config::defaults(&runtime.work_path))?;
    Ok(Loaded {
        runtime,
        path,
        config,
    })
}
