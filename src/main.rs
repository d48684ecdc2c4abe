use anyhow::Result;
use colored::Colorize;
use pcr_analyzer::config::{AppConfig, Mode};
use pcr_analyzer::{console, dashboard, logging, NSEClient, Refresher, SnapshotSource};
use std::sync::Arc;
use tracing::info;

/// Fetch once, print, exit
async fn run_once(refresher: &Refresher, cfg: &AppConfig) -> Result<()> {
    let report = refresher.tick().await?;
    console::print_report(&report, cfg.strike_rows);
    Ok(())
}

/// Reprint on every refresh tick until interrupted
async fn run_watch(refresher: &Refresher, cfg: &AppConfig) -> Result<()> {
    println!(
        "{} Refreshing {} every {}s (Ctrl+C to stop)",
        "ℹ".blue(),
        cfg.symbol.yellow(),
        cfg.refresh_interval.as_secs()
    );

    let strike_rows = cfg.strike_rows;
    tokio::select! {
        _ = refresher.run(|outcome| match outcome {
            Ok(report) => console::print_report(&report, strike_rows),
            Err(e) => eprintln!("{} {:#}", "✗".red(), e),
        }) => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", "Stopped.".green());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging()?;

    let cfg = AppConfig::from_env()?;
    info!(?cfg, "Starting PCR analyzer");

    let source: Arc<dyn SnapshotSource> = Arc::new(NSEClient::new()?);
    let refresher = Refresher::new(source, cfg.symbol.clone(), cfg.expiry.clone(), cfg.refresh_interval);

    match cfg.mode {
        Mode::Once => run_once(&refresher, &cfg).await?,
        Mode::Watch => run_watch(&refresher, &cfg).await?,
        Mode::Server => dashboard::start_server(cfg.port, refresher).await?,
    }

    Ok(())
}
