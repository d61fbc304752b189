use anyhow::Result;
use bedisk::{database, AppContext};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

/// Execute the start command
///
/// This will:
/// 1. Bootstrap the application context
/// 2. Install the log engine as the global dispatcher
/// 3. Wait for Ctrl+C or SIGTERM
/// 4. Save the configuration and exit
pub async fn execute(config_override: Option<PathBuf>) -> Result<()> {
    println!("{}", "Starting bedisk...".green());

    let ctx = AppContext::bootstrap(config_override)?;
    ctx.log().install()?;

    // From here on failures are recorded in the log file
    if let Err(e) = run(&ctx).await {
        ctx.log().fatal(&format!("{:#}", e));
        return Err(e);
    }
    Ok(())
}

async fn run(ctx: &AppContext) -> Result<()> {
    let cfg = ctx.config();
    info!(
        mode = if ctx.runtime().is_dev_mode { "development" } else { "production" },
        work_path = %ctx.runtime().work_path.display(),
        config = %ctx.config_path().display(),
        log_file = %ctx.log().link_file().display(),
        "bedisk started"
    );
    info!(
        http_serve = %format!("{}:{}", cfg.http_serve.host, cfg.http_serve.port),
        database = %database::redacted_dsn(&cfg.database),
        query_log_level = %ctx.queries().level(),
        slow_threshold = ctx.queries().slow_threshold(),
        "Service settings"
    );

    let pool = ctx.connect_database();

    shutdown_signal().await?;

    pool.close().await;
    ctx.save_config()?;
    info!("bedisk stopped");

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Ctrl+C received, shutting down");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received, shutting down");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    Ok(())
}
