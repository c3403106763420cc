//! Prerender - caching, admission-controlled front for headless rendering
//!
//! Rendering a JavaScript-heavy page in a headless browser is slow and
//! memory hungry. This crate puts a bounded TTL + LRU cache in front of a
//! [`Renderer`], caps how many renders run at once with a FIFO
//! [`AdmissionQueue`], and fingerprints every document so clients can
//! revalidate with `If-None-Match` instead of downloading it again.
//!
//! # Example
//!
//! ```rust,no_run
//! use prerender::{CacheConfig, Lookup, Prerender, QueueConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> prerender::Result<()> {
//!     let gateway = Prerender::builder()
//!         .remote("http://127.0.0.1:3000")
//!         .cache(CacheConfig::new().max_entries(500).ttl(Duration::from_secs(3600)))
//!         .queue(QueueConfig::new().concurrency(4))
//!         .build()?;
//!
//!     match gateway.fetch("https://example.com/", None).await? {
//!         Lookup::Document(doc) => println!("{} bytes, etag {}", doc.artifact.len(), doc.fingerprint.to_etag()),
//!         Lookup::NotModified { .. } => unreachable!("no validator sent"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
#[cfg(feature = "client")]
pub mod client;
pub mod error;
pub mod gateway;
pub mod queue;
pub mod render;
#[cfg(feature = "server")]
pub mod server;
mod sync;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use cache::{CacheConfig, CacheEntry, CacheStats, Fingerprint, RenderCache};
pub use error::{PrerenderError, Result};
pub use gateway::{
    GatewayStats, Lookup, Prerender, PrerenderBuilder, Prewarm, RenderGateway, Rendered, Source,
    validate_key,
};
pub use queue::{AdmissionQueue, JobHandle, QueueConfig, QueueStats};
pub use render::{RemoteRenderer, RenderConfig, Renderer, ResourceType, RetryConfig};
pub use version::{PKG_VERSION, version_string};
