use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use m3u_curator::{config::Config, pipeline};

#[derive(Parser)]
#[command(name = "m3u-curator")]
#[command(version)]
#[command(about = "Curates IPTV playlists by probing, merging and filtering stream sources")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Directory of local playlist source files (overrides config)
    #[arg(short, long, value_name = "DIR")]
    local_path: Option<PathBuf>,

    /// Output file path (overrides config)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("m3u_curator={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting m3u-curator v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    if let Some(local_path) = cli.local_path {
        config.sources.local_path = Some(local_path);
    }
    if let Some(output) = cli.output {
        config.output.file = output;
    }

    // One token covers the whole run: ctrl-c stops new work immediately and
    // in-flight probes at their next network read.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, cancelling in-flight work");
            signal_cancel.cancel();
        }
    });

    let written = pipeline::run(&config, &cancel).await?;
    info!("All done, curated playlist at {}", written.display());
    Ok(())
}
