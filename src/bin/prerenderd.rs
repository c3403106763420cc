//! prerenderd - prerender daemon.
//!
//! Serves cached renders of JavaScript-heavy pages over HTTP, rendering
//! misses through a remote headless-browser service.

use std::net::SocketAddr;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prerender::PrerenderError;
use prerender::server::{self, Config, StatsLimits};

/// Prerender daemon - caching front for headless rendering.
#[derive(Parser)]
#[command(name = "prerenderd")]
#[command(version = prerender::PKG_VERSION)]
#[command(about = "Prerender caching daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Address to bind to (overrides config).
    #[arg(short, long, env = "PRERENDER_ADDRESS")]
    address: Option<String>,

    /// Renders allowed to run at once (overrides config).
    #[arg(long, env = "PRERENDER_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Base URL of the rendering service (overrides config).
    #[arg(long, env = "PRERENDER_RENDERER_URL")]
    renderer_url: Option<String>,

    /// Bearer token for the rendering service.
    #[arg(long, env = "PRERENDER_RENDERER_TOKEN", hide_env_values = true)]
    renderer_token: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialise tracing (default: info for the daemon; override with RUST_LOG).
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration, then apply CLI/env overrides
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(address) = args.address {
        config.server.address = address;
    }
    if let Some(concurrency) = args.concurrency {
        config.queue.concurrency = concurrency;
    }
    if let Some(url) = args.renderer_url {
        config.renderer.endpoint = url;
    }

    let gateway = server::build_gateway(&config, args.renderer_token.as_deref())?;

    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| PrerenderError::Configuration(format!("Invalid address: {e}")))?;

    info!(
        version = prerender::version_string(),
        %addr,
        renderer = %config.renderer.endpoint,
        concurrency = config.queue.concurrency,
        max_entries = config.cache.max_entries,
        ttl_secs = config.cache.ttl_secs,
        "prerenderd starting"
    );

    let app = server::router(gateway, StatsLimits::from(&config.server));
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("prerenderd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested, draining connections");
}
