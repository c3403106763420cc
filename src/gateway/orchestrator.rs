//! RenderGateway - ties the cache, the admission queue and the renderer together

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_util::FutureExt;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::inflight::InflightRenders;
use crate::cache::{CacheStats, Fingerprint, RenderCache};
use crate::queue::{AdmissionQueue, JobHandle, QueueStats};
use crate::render::retry::with_retry;
use crate::render::{RenderConfig, Renderer, RetryConfig};
use crate::telemetry;
use crate::{PrerenderError, Result};

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Served from the cache without rendering.
    Cache,
    /// Produced by a render for this request (or one it joined).
    Render,
}

/// A rendered document together with its validator.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub key: String,
    pub artifact: Bytes,
    pub fingerprint: Fingerprint,
    pub source: Source,
}

/// Outcome of [`RenderGateway::fetch`].
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The caller's validator matches the cached document; send no body.
    NotModified { fingerprint: Fingerprint },
    /// The full document.
    Document(Rendered),
}

/// Outcome of [`RenderGateway::prewarm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prewarm {
    /// A live entry already existed; nothing was rendered.
    AlreadyCached,
    /// The key was rendered and stored.
    Rendered(Fingerprint),
}

impl Prewarm {
    pub fn was_cached(&self) -> bool {
        matches!(self, Prewarm::AlreadyCached)
    }
}

/// Combined cache and queue statistics.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStats {
    pub cache: CacheStats,
    pub queue: QueueStats,
    /// Keys with a shared render in flight (single-flight mode only).
    pub inflight: usize,
}

/// Check that `key` is an absolute http(s) URL.
///
/// The key is validated but never rewritten: the cache is keyed on the
/// exact string the caller sent.
pub fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(PrerenderError::InvalidRequest("missing url".to_string()));
    }
    let parsed = Url::parse(key)
        .map_err(|e| PrerenderError::InvalidRequest(format!("malformed url '{key}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(PrerenderError::InvalidRequest(format!(
            "unsupported url scheme '{other}'"
        ))),
    }
}

pub(crate) struct Core {
    pub(crate) cache: RenderCache,
    pub(crate) queue: AdmissionQueue,
    pub(crate) renderer: Arc<dyn Renderer>,
    pub(crate) render_config: RenderConfig,
    pub(crate) retry: RetryConfig,
    pub(crate) inflight: Option<InflightRenders>,
}

/// Cache-first front for a [`Renderer`].
///
/// Every request consults the cache; misses become render jobs on the
/// admission queue and successful renders are written back. Failed
/// renders leave the cache untouched, so the next request tries again.
///
/// Cheap to clone; clones share the cache, the queue and the renderer.
#[derive(Clone)]
pub struct RenderGateway {
    core: Arc<Core>,
}

impl RenderGateway {
    pub(crate) fn from_core(core: Core) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    /// Serve `key`, honouring an optional `If-None-Match` validator.
    ///
    /// A cache hit whose fingerprint matches `validator` yields
    /// [`Lookup::NotModified`]. Any other hit returns the cached document.
    /// A miss renders (through the queue), stores and returns the new
    /// document.
    #[instrument(name = "gateway.fetch", skip(self, validator))]
    pub async fn fetch(&self, key: &str, validator: Option<&str>) -> Result<Lookup> {
        validate_key(key)?;

        if let Some(entry) = self.core.cache.get(key) {
            if validator.is_some_and(|v| entry.fingerprint.matches(v)) {
                debug!(fingerprint = %entry.fingerprint, "validator matched");
                metrics::counter!(telemetry::NOT_MODIFIED_TOTAL).increment(1);
                return Ok(Lookup::NotModified {
                    fingerprint: entry.fingerprint,
                });
            }
            debug!(hits = entry.hit_count, "serving cached render");
            return Ok(Lookup::Document(Rendered {
                key: entry.key,
                artifact: entry.artifact,
                fingerprint: entry.fingerprint,
                source: Source::Cache,
            }));
        }

        debug!("cache miss, rendering");
        self.render_miss(key).await.map(Lookup::Document)
    }

    /// Populate `key` ahead of demand, waiting for the render.
    ///
    /// A live entry is left as it is: it is not promoted and no hit is
    /// counted.
    #[instrument(name = "gateway.prewarm", skip(self))]
    pub async fn prewarm(&self, key: &str) -> Result<Prewarm> {
        validate_key(key)?;
        if self.core.cache.contains(key) {
            return Ok(Prewarm::AlreadyCached);
        }
        let rendered = self.render_miss(key).await?;
        Ok(Prewarm::Rendered(rendered.fingerprint))
    }

    /// Populate `key` ahead of demand without waiting.
    ///
    /// Returns `true` if the key was already cached. Otherwise the render
    /// is started in the background and `false` is returned; failures are
    /// logged.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn prewarm_detached(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        if self.core.cache.contains(key) {
            return Ok(true);
        }

        let gateway = self.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            match gateway.render_miss(&key).await {
                Ok(rendered) => {
                    info!(key, fingerprint = %rendered.fingerprint, "prewarmed")
                }
                Err(e) => warn!(key, error = %e, "prewarm failed"),
            }
        });
        Ok(false)
    }

    /// Drop the cached render for `key`. Returns whether one existed.
    #[instrument(name = "gateway.purge", skip(self))]
    pub fn purge(&self, key: &str) -> bool {
        let purged = self.core.cache.delete(key);
        debug!(purged, "purge");
        purged
    }

    /// Cache and queue statistics.
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            cache: self.core.cache.stats(),
            queue: self.core.queue.stats(),
            inflight: self.core.inflight.as_ref().map_or(0, InflightRenders::len),
        }
    }

    /// Up to `limit` live keys, most recently used first.
    pub fn keys(&self, limit: usize) -> Vec<String> {
        self.core.cache.keys(limit)
    }

    /// Underlying cache.
    pub fn cache(&self) -> &RenderCache {
        &self.core.cache
    }

    /// Underlying admission queue.
    pub fn queue(&self) -> &AdmissionQueue {
        &self.core.queue
    }

    /// Render configuration passed to every job.
    pub fn render_config(&self) -> &RenderConfig {
        &self.core.render_config
    }

    async fn render_miss(&self, key: &str) -> Result<Rendered> {
        match self.core.inflight {
            Some(ref inflight) => {
                let core = Arc::clone(&self.core);
                let owned = key.to_string();
                inflight
                    .run(key, move || {
                        async move { Core::render_with_retry(&core, &owned).await }.boxed()
                    })
                    .await
            }
            None => Core::render_with_retry(&self.core, key).await,
        }
    }
}

impl Core {
    async fn render_with_retry(this: &Arc<Self>, key: &str) -> Result<Rendered> {
        with_retry(&this.retry, key, || Self::submit_render(this, key)).await
    }

    /// Queue one render attempt for `key`.
    ///
    /// The cache write happens inside the job, so a render completes and is
    /// stored even if every caller waiting on it has gone away.
    fn submit_render(this: &Arc<Self>, key: &str) -> JobHandle<Rendered> {
        let core = Arc::clone(this);
        let key = key.to_string();
        this.queue.submit(move || async move {
            let renderer = core.renderer.name().to_string();
            let start = Instant::now();
            let outcome = core.renderer.render(&key, &core.render_config).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            let html = match outcome {
                Ok(html) => {
                    metrics::counter!(telemetry::RENDERS_TOTAL,
                        "renderer" => renderer,
                        "status" => "ok",
                    )
                    .increment(1);
                    html
                }
                Err(e) => {
                    metrics::counter!(telemetry::RENDERS_TOTAL,
                        "renderer" => renderer,
                        "status" => "error",
                    )
                    .increment(1);
                    warn!(key, elapsed_ms, error = %e, "render failed");
                    return Err(e);
                }
            };

            let artifact = Bytes::from(html);
            let fingerprint = Fingerprint::of(&artifact);
            core.cache
                .set(key.clone(), artifact.clone(), fingerprint.clone());
            info!(
                key,
                elapsed_ms,
                bytes = artifact.len(),
                fingerprint = %fingerprint,
                "rendered"
            );

            Ok(Rendered {
                key,
                artifact,
                fingerprint,
                source: Source::Render,
            })
        })
    }
}
