//! Ramjet - transparent web proxy server.
//!
//! Loads the deployment configuration, applies command-line overrides and
//! serves the network request handler until interrupted.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ramjet_core::RamjetConfig;
use ramjet_worker::ProxyServer;
use tracing_subscriber::EnvFilter;

/// Ramjet - transparent web proxy
#[derive(Parser, Debug)]
#[command(name = "ramjet", version, about)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Origin pages are served from (scheme, host and port)
    #[arg(long)]
    origin: Option<String>,

    /// Path prefix for proxied URLs
    #[arg(long)]
    prefix: Option<String>,

    /// Mark responses for a cross-origin isolated embedder
    #[arg(long)]
    cross_origin_isolated: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Initialize console logging.
fn init_logging(args: &Args) {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ramjet={level},ramjet_core={level},ramjet_worker={level},warn",
            level = log_level
        ))
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Builds the effective configuration: file (or defaults), then flags.
fn build_config(args: &Args) -> Result<RamjetConfig> {
    let mut config = match &args.config {
        Some(path) => RamjetConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path))?,
        None => RamjetConfig::default(),
    };

    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
        // The default origin tracks the port.
        if args.origin.is_none() && args.config.is_none() {
            config = config.with_origin(format!("http://127.0.0.1:{}", port));
        }
    }
    if let Some(origin) = &args.origin {
        config = config.with_origin(origin.clone());
    }
    if let Some(prefix) = &args.prefix {
        config = config.with_prefix(prefix.clone());
    }
    if args.cross_origin_isolated {
        config = config.with_cross_origin_isolated(true);
    }

    config.validate().context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let config = build_config(&args)?;
    tracing::info!(
        "Ramjet v{} serving {} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.proxy_base(),
        config.bind_addr,
        config.port
    );

    let server = ProxyServer::from_config(config).context("Failed to create proxy server")?;
    let handle = server.start().await.context("Failed to start proxy server")?;
    tracing::info!("Listening on {}", handle.addr());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    handle.stop().await;

    Ok(())
}
