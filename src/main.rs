use anyhow::{Context, Result};

use risk_picks::cli::run_cli;
use risk_picks::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set RISK_PICKS_CONFIG or run from a directory containing config/default.toml");
            std::process::exit(1);
        }
    };

    // Log to file so stdout stays clean for CSV/JSON output
    let log_file = std::fs::File::create(&config.logging.file)
        .with_context(|| format!("failed to create {}", config.logging.file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            }),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    tracing::info!(
        benchmark = %config.pipeline.benchmark,
        artifacts = %config.artifacts.dir.display(),
        top_n = config.pipeline.top_n,
        "Starting risk-picks"
    );

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run_cli(&args, &config).await {
        let detail = format!("{:#}", e);
        tracing::error!(error = %detail, "Command failed");
        return Err(e);
    }
    Ok(())
}
