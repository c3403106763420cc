//! prctl - prerender control client
//!
//! Inspect and steer a running prerenderd.

use clap::{Parser, Subcommand};
use prerender::client::{Fetched, ServiceClient};

/// Prerender control client
#[derive(Parser)]
#[command(name = "prctl")]
#[command(version = prerender::PKG_VERSION)]
#[command(about = "Prerender daemon control client")]
struct Args {
    /// Server address
    #[arg(
        short,
        long,
        env = "PRERENDERD_URL",
        default_value = "http://127.0.0.1:8686"
    )]
    address: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check service health
    Health,

    /// Show cache and queue statistics
    Stats {
        /// Number of cached keys to list
        #[arg(short, long)]
        keys: Option<usize>,
    },

    /// Fetch a render (prints the document to stdout)
    Get {
        /// Page URL
        url: String,
        /// Send this ETag as If-None-Match
        #[arg(long)]
        etag: Option<String>,
        /// Print response headers instead of the body
        #[arg(long)]
        headers_only: bool,
    },

    /// Remove a cached render
    Purge {
        /// Page URL
        url: String,
    },

    /// Render a page ahead of demand
    Prewarm {
        /// Page URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = ServiceClient::new(&args.address)?;

    match args.command {
        Command::Health => {
            let health = client.health().await?;
            println!("prerenderd {} ({})", health.version, client.base());
            println!("status: {}", health.status);
        }

        Command::Stats { keys } => {
            let stats = client.stats(keys).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Get {
            url,
            etag,
            headers_only,
        } => match client.get(&url, etag.as_deref()).await? {
            Fetched::NotModified { etag } => {
                println!("304 Not Modified");
                if let Some(etag) = etag {
                    println!("etag: {etag}");
                }
            }
            Fetched::Document {
                body,
                etag,
                cache_status,
            } => {
                if headers_only {
                    println!("200 OK");
                    println!("etag: {}", etag.as_deref().unwrap_or("-"));
                    println!("cache: {}", cache_status.as_deref().unwrap_or("-"));
                    println!("bytes: {}", body.len());
                } else {
                    print!("{body}");
                }
            }
        },

        Command::Purge { url } => {
            if client.purge(&url).await? {
                println!("purged {url}");
            } else {
                println!("not cached: {url}");
            }
        }

        Command::Prewarm { url } => {
            if client.prewarm(&url).await? {
                println!("already cached: {url}");
            } else {
                println!("render started: {url}");
            }
        }
    }

    Ok(())
}
