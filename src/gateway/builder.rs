//! Builder for configuring gateway instances

use std::sync::Arc;

use super::RenderGateway;
use super::inflight::InflightRenders;
use super::orchestrator::Core;
use crate::cache::{CacheConfig, RenderCache};
use crate::queue::{AdmissionQueue, QueueConfig};
use crate::render::{RemoteRenderer, RenderConfig, Renderer, RetryConfig};
use crate::{PrerenderError, Result};

/// Main entry point for creating gateway instances.
pub struct Prerender;

impl Prerender {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> PrerenderBuilder {
        PrerenderBuilder::new()
    }
}

/// Builder for configuring gateway instances.
///
/// ```rust,no_run
/// # use prerender::{CacheConfig, Prerender, QueueConfig};
/// # use std::time::Duration;
/// # fn main() -> prerender::Result<()> {
/// let gateway = Prerender::builder()
///     .remote("http://127.0.0.1:3000")
///     .cache(CacheConfig::new().max_entries(1_000).ttl(Duration::from_secs(900)))
///     .queue(QueueConfig::new().concurrency(8))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct PrerenderBuilder {
    renderer: Option<Arc<dyn Renderer>>,
    remote_endpoint: Option<String>,
    remote_token: Option<String>,
    cache: CacheConfig,
    queue: QueueConfig,
    render: RenderConfig,
    retry: RetryConfig,
    dedupe_inflight: bool,
}

impl PrerenderBuilder {
    pub fn new() -> Self {
        Self {
            renderer: None,
            remote_endpoint: None,
            remote_token: None,
            cache: CacheConfig::default(),
            queue: QueueConfig::default(),
            render: RenderConfig::default(),
            retry: RetryConfig::default(),
            dedupe_inflight: false,
        }
    }

    /// Use a custom renderer. Takes precedence over [`remote()`](Self::remote).
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Render through the headless-browser service at `endpoint`.
    pub fn remote(mut self, endpoint: impl Into<String>) -> Self {
        self.remote_endpoint = Some(endpoint.into());
        self
    }

    /// Bearer token for the remote rendering service.
    pub fn remote_token(mut self, token: impl Into<String>) -> Self {
        self.remote_token = Some(token.into());
        self
    }

    /// Set cache capacity and TTL.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    /// Set the render concurrency bound.
    pub fn queue(mut self, config: QueueConfig) -> Self {
        self.queue = config;
        self
    }

    /// Set how pages are rendered.
    pub fn render_config(mut self, config: RenderConfig) -> Self {
        self.render = config;
        self
    }

    /// Retry failed renders. Default: a single attempt.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Let concurrent misses for the same key share one render.
    ///
    /// Off by default: with it off, every miss is its own job and takes
    /// its own queue slot.
    pub fn dedupe_inflight(mut self, enabled: bool) -> Self {
        self.dedupe_inflight = enabled;
        self
    }

    /// Build the gateway.
    pub fn build(self) -> Result<RenderGateway> {
        let renderer: Arc<dyn Renderer> = match (self.renderer, self.remote_endpoint) {
            (Some(renderer), _) => renderer,
            (None, Some(endpoint)) => {
                let mut remote = RemoteRenderer::new(endpoint)?;
                if let Some(token) = self.remote_token {
                    remote = remote.token(token);
                }
                Arc::new(remote)
            }
            (None, None) => {
                return Err(PrerenderError::Configuration(
                    "no renderer configured".to_string(),
                ));
            }
        };

        let cache = RenderCache::new(&self.cache)?;
        let queue = AdmissionQueue::new(&self.queue)?;

        Ok(RenderGateway::from_core(Core {
            cache,
            queue,
            renderer,
            render_config: self.render,
            retry: self.retry,
            inflight: self.dedupe_inflight.then(InflightRenders::new),
        }))
    }
}

impl Default for PrerenderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
