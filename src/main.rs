//! socksd - CONNECT-only SOCKS5 proxy server

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use socksd::{config::ConfigManager, ConnectionManager};

/// CLI arguments for socksd
#[derive(Parser, Debug)]
#[command(name = "socksd")]
#[command(about = "CONNECT-only SOCKS5 proxy server")]
#[command(version)]
pub struct CliArgs {
    /// Port to listen on
    #[arg(short, long, help = "Port to listen on (0-65535)")]
    pub port: u16,

    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "config.toml",
        help = "Path to configuration file"
    )]
    pub config: PathBuf,

    /// Bind address (overrides config file)
    #[arg(short, long, help = "Address to bind (e.g. 127.0.0.1)")]
    pub bind: Option<IpAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", help = "Log level")]
    pub log_level: String,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Argument errors (a missing or out-of-range --port included) print
    // the usage listing to stdout and exit non-zero; --help and
    // --version keep clap's stock handling.
    let args = CliArgs::try_parse().unwrap_or_else(|e| {
        if e.use_stderr() {
            print!("{e}");
            std::process::exit(2);
        }
        e.exit()
    });

    init_tracing(&args);

    info!("Starting socksd v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ConfigManager::load_from_file(&args.config)?;
    config.merge_with_cli_args(args.bind, args.port);
    config
        .validate()
        .context("Final configuration validation failed")?;

    let manager = ConnectionManager::bind(Arc::new(config)).await?;

    tokio::select! {
        result = manager.serve() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(args: &CliArgs) {
    let log_level: &str = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true),
        )
        .with(tracing_subscriber::EnvFilter::new(log_level))
        .init();
}
