//! LED streamer binary
//!
//! Usage:
//!   streamer --config config/streamer.toml
//!   STREAMER__NETWORK__PORT=50000 streamer --config config/streamer.toml --status-json

use anyhow::{Context, Result};
use clap::Parser;
use settings::Settings;
use std::path::PathBuf;
use std::time::Duration;
use streamer::{status, Server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "streamer")]
#[command(about = "Streams rendered LED frames to strip controllers")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,

    /// Print each status report to stdout as a JSON line
    #[arg(long)]
    status_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting LED streamer");
    let settings = Settings::load(args.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {:#}", e);
        e
    })?;

    if settings.sites.is_empty() {
        info!("No sites configured, nothing to stream");
    }

    let server = Server::start(&settings);

    let mut ticker = match settings.status.interval_secs {
        0 => None,
        secs => Some(tokio::time::interval(Duration::from_secs(secs))),
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("Failed to listen for CTRL+C")?;
                info!("Received shutdown signal");
                break;
            }
            _ = next_report(&mut ticker) => report(&server, args.status_json),
        }
    }

    server.stop().await;
    Ok(())
}

async fn next_report(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn report(server: &Server, as_json: bool) {
    let snapshot = server.status();
    if as_json {
        match status::to_json_line(&snapshot) {
            Ok(line) => println!("{line}"),
            Err(e) => error!("Failed to serialize status: {}", e),
        }
    } else {
        status::log_status(&snapshot);
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;

    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}
