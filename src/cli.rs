use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bedisk", version, about = "bedisk service")]
pub struct Cli {
    /// Configuration file path (default: <work path>/bedisk.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the service and run until Ctrl+C or SIGTERM (default)
    Start,

    /// Test configuration file validity
    Test,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display current configuration (with secrets masked)
    Show,

    /// Write the merged configuration back, filling in missing keys
    Init,

    /// Print the resolved configuration file path
    Path,
}

impl Cli {
    /// Get the command to execute, defaulting to Start if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_start() {
        let cli = Cli {
            config: None,
            command: None,
        };

        assert!(matches!(cli.get_command(), Commands::Start));
    }

    #[test]
    fn test_cli_parsing_config_override() {
        let args = vec!["bedisk", "--config", "/etc/bedisk.toml", "start"];
        let cli = Cli::try_parse_from(args).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/bedisk.toml")));
        assert!(matches!(cli.get_command(), Commands::Start));
    }

    #[test]
    fn test_config_flag_is_global() {
        let args = vec!["bedisk", "config", "path", "-c", "custom.toml"];
        let cli = Cli::try_parse_from(args).unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.get_command() {
            Commands::Config { action } => {
                assert!(matches!(action, ConfigCommands::Path));
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_cli_parsing_config_show() {
        let args = vec!["bedisk", "config", "show"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.get_command() {
            Commands::Config { action } => {
                assert!(matches!(action, ConfigCommands::Show));
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let args = vec!["bedisk", "stop"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
