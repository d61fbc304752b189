//! Lives in its own test binary since it mutates the process environment.
//! Everything runs in one test so no two loads race on the variables.

use bedisk::config::{self, Config};
use bedisk::observability::QueryLogLevel;
use std::fs;
use tempfile::TempDir;

const VARS: &[(&str, &str)] = &[
    ("BEDISK__HTTP_SERVE__PORT", "7777"),
    ("BEDISK__DATABASE__LOG_LEVEL", "error"),
    ("BEDISK__DATABASE__SLOW_THRESHOLD", "-1"),
    ("BEDISK__DATABASE__PASSWORD", "1e3"),
    ("BEDISK__DATABASE__USER", "007"),
];

#[test]
fn test_env_overrides_beat_file_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bedisk.toml");
    fs::write(&path, "[http_serve]\nport = 9000\n").unwrap();

    for (key, value) in VARS {
        std::env::set_var(key, value);
    }
    let result = config::load(&path, &Config::defaults(temp_dir.path()));
    for (key, _) in VARS {
        std::env::remove_var(key);
    }

    let cfg = result.unwrap();
    assert_eq!(cfg.http_serve.port, 7777);
    assert_eq!(cfg.database.log_level, QueryLogLevel::Error);
    assert_eq!(cfg.database.slow_threshold, -1);
    assert_eq!(cfg.database.host, "127.0.0.1");

    // String values are taken verbatim, even when they look numeric
    assert_eq!(cfg.database.password, "1e3");
    assert_eq!(cfg.database.user, "007");
}
