use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::Cli::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Once the log engine is installed the failure is already in the log
            if !tracing::dispatcher::has_been_set() {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: cli::Cli) -> anyhow::Result<()> {
    let config = args.config.clone();

    match args.get_command() {
        cli::Commands::Start => commands::start::execute(config).await,
        cli::Commands::Test => commands::test::execute(config),
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(config),
            cli::ConfigCommands::Init => commands::config::init(config),
            cli::ConfigCommands::Path => commands::config::path(config),
        },
        cli::Commands::Version => {
            println!("bedisk v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
