use anyhow::Result;
use bedisk::config::{self, Config};
use colored::Colorize;
use std::path::PathBuf;

/// Execute the config show command
///
/// Displays the merged configuration with the database password masked
pub fn show(config_override: Option<PathBuf>) -> Result<()> {
    println!("{}", "Loading configuration...".yellow());

    let loaded = super::load(config_override)?;
    let sanitized = sanitize_secrets(&loaded.config);

    println!(
        "{} {}",
        "Current Configuration:".green().bold(),
        loaded.path.display().to_string().dimmed()
    );
    println!();
    println!("{}", config::render(&sanitized));

    Ok(())
}

/// Execute the config init command
///
/// Loads the file (creating it when absent) and writes every key back
pub fn init(config_override: Option<PathBuf>) -> Result<()> {
    let loaded = super::load(config_override)?;
    config::save(&loaded.path, &loaded.config)?;

    println!(
        "{} {}",
        "✓ Configuration written to".green(),
        loaded.path.display()
    );
    Ok(())
}

/// Execute the config path command
pub fn path(config_override: Option<PathBuf>) -> Result<()> {
    let (_, path) = super::resolve_path(config_override)?;
    println!("{}", path.display());
    Ok(())
}

fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();
    sanitized.database.password = mask_secret(&sanitized.database.password);
    sanitized
}

/// Mask a secret for display, keeping only whether it is set
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("root"), "***");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn test_sanitize_only_touches_password() {
        let mut cfg = Config::defaults(Path::new("/srv/bedisk"));
        cfg.database.password = "hunter2".to_string();

        let sanitized = sanitize_secrets(&cfg);
        assert_eq!(sanitized.database.password, "***");
        assert_eq!(sanitized.database.user, cfg.database.user);
        assert!(!config::render(&sanitized).contains("hunter2"));
    }
}
