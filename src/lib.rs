//! Bootstrap core for the bedisk service
//!
//! Resolves the runtime mode and work path, loads layered configuration,
//! brings up the rolling log engine and builds the query observer that the
//! data-access layer reports to. [`app::AppContext`] ties them together.

pub mod app;
pub mod config;
pub mod database;
pub mod env;
pub mod error;
pub mod fs_utils;
pub mod logging;
pub mod observability;

pub use app::AppContext;
pub use error::StartupError;
