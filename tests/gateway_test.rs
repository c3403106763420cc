//! Tests for RenderGateway: cache-first serving, conditional requests,
//! failure handling, prewarm, single-flight and retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;

use prerender::{
    CacheConfig, Lookup, Prerender, PrerenderError, Prewarm, QueueConfig, RenderConfig,
    RenderGateway, Rendered, Renderer, Result, RetryConfig, Source,
};

const PAGE: &str = "https://shop.test/products/42";

// ============================================================================
// Mock renderer
// ============================================================================

/// Renders `<html>{url} #{n}</html>` where `n` counts calls, so every render
/// of a key produces a distinct document. The first `failures` calls fail
/// with `error`.
struct ScriptedRenderer {
    calls: AtomicUsize,
    failures: AtomicUsize,
    error: PrerenderError,
    delay: Duration,
}

impl ScriptedRenderer {
    fn ok() -> Arc<Self> {
        Self::failing(0, PrerenderError::RenderFailure("unused".into()))
    }

    fn failing(failures: usize, error: PrerenderError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(failures),
            error,
            delay: Duration::ZERO,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            error: PrerenderError::RenderFailure("unused".into()),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn render(&self, url: &str, _config: &RenderConfig) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(self.error.clone());
        }
        Ok(format!("<html>{url} #{n}</html>"))
    }
}

fn gateway(renderer: Arc<ScriptedRenderer>) -> RenderGateway {
    Prerender::builder().renderer(renderer).build().unwrap()
}

fn document(lookup: Lookup) -> Rendered {
    match lookup {
        Lookup::Document(rendered) => rendered,
        Lookup::NotModified { .. } => panic!("expected a document, got NotModified"),
    }
}

// ============================================================================
// Cache-first serving
// ============================================================================

#[tokio::test]
async fn miss_renders_then_hit_serves_from_cache() {
    let renderer = ScriptedRenderer::ok();
    let gateway = gateway(renderer.clone());

    let first = document(gateway.fetch(PAGE, None).await.unwrap());
    assert_eq!(first.source, Source::Render);
    assert_eq!(first.artifact, format!("<html>{PAGE} #1</html>"));

    let second = document(gateway.fetch(PAGE, None).await.unwrap());
    assert_eq!(second.source, Source::Cache);
    assert_eq!(second.artifact, first.artifact);
    assert_eq!(second.fingerprint, first.fingerprint);

    assert_eq!(renderer.calls(), 1);
    assert_eq!(gateway.cache().get(PAGE).unwrap().hit_count, 2);
}

#[tokio::test]
async fn invalid_key_is_rejected_without_rendering() {
    let renderer = ScriptedRenderer::ok();
    let gateway = gateway(renderer.clone());

    for key in ["", "not a url", "/relative", "ftp://files.test/a"] {
        let err = gateway.fetch(key, None).await.unwrap_err();
        assert!(
            matches!(err, PrerenderError::InvalidRequest(_)),
            "{key:?} gave {err:?}"
        );
    }
    assert_eq!(renderer.calls(), 0);
}

#[tokio::test]
async fn builder_without_renderer_fails() {
    let err = Prerender::builder().build().err().expect("must fail");
    assert!(matches!(err, PrerenderError::Configuration(_)));
}

#[tokio::test]
async fn builder_rejects_invalid_limits() {
    let result = Prerender::builder()
        .renderer(ScriptedRenderer::ok())
        .queue(QueueConfig::new().concurrency(0))
        .build();
    assert!(matches!(result, Err(PrerenderError::Configuration(_))));

    let result = Prerender::builder()
        .renderer(ScriptedRenderer::ok())
        .cache(CacheConfig::new().max_entries(0))
        .build();
    assert!(matches!(result, Err(PrerenderError::Configuration(_))));
}

// ============================================================================
// Conditional requests
// ============================================================================

#[tokio::test]
async fn matching_validator_yields_not_modified() {
    let gateway = gateway(ScriptedRenderer::ok());
    let rendered = document(gateway.fetch(PAGE, None).await.unwrap());
    let etag = rendered.fingerprint.to_etag();

    match gateway.fetch(PAGE, Some(&etag)).await.unwrap() {
        Lookup::NotModified { fingerprint } => assert_eq!(fingerprint, rendered.fingerprint),
        Lookup::Document(_) => panic!("expected NotModified"),
    }
    assert!(matches!(
        gateway.fetch(PAGE, Some("*")).await.unwrap(),
        Lookup::NotModified { .. }
    ));
}

#[tokio::test]
async fn stale_validator_gets_full_document() {
    let gateway = gateway(ScriptedRenderer::ok());
    document(gateway.fetch(PAGE, None).await.unwrap());

    let served = document(gateway.fetch(PAGE, Some("W/\"0000\"")).await.unwrap());
    assert_eq!(served.source, Source::Cache);
}

#[tokio::test]
async fn miss_with_validator_returns_full_document() {
    let renderer = ScriptedRenderer::ok();
    let gateway = gateway(renderer.clone());

    let first = document(gateway.fetch(PAGE, None).await.unwrap());
    assert!(gateway.purge(PAGE));

    // The old validator no longer refers to anything cached: render again
    // and send the new document even though nothing may have changed.
    let second = document(
        gateway
            .fetch(PAGE, Some(&first.fingerprint.to_etag()))
            .await
            .unwrap(),
    );
    assert_eq!(second.source, Source::Render);
    assert_ne!(second.fingerprint, first.fingerprint);
    assert_eq!(renderer.calls(), 2);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn failed_render_does_not_pollute_cache() {
    let renderer = ScriptedRenderer::failing(1, PrerenderError::RenderFailure("net::ERR".into()));
    let gateway = gateway(renderer.clone());

    let err = gateway.fetch(PAGE, None).await.unwrap_err();
    assert!(matches!(err, PrerenderError::RenderFailure(ref m) if m == "net::ERR"));
    assert!(gateway.cache().is_empty());

    let rendered = document(gateway.fetch(PAGE, None).await.unwrap());
    assert_eq!(rendered.source, Source::Render);
    assert_eq!(renderer.calls(), 2);
}

#[tokio::test]
async fn render_timeout_propagates_unchanged() {
    let renderer = ScriptedRenderer::failing(
        1,
        PrerenderError::RenderTimeout {
            url: PAGE.into(),
            timeout: Duration::from_secs(15),
        },
    );
    let gateway = gateway(renderer);

    let err = gateway.fetch(PAGE, None).await.unwrap_err();
    assert!(matches!(err, PrerenderError::RenderTimeout { timeout, .. } if timeout == Duration::from_secs(15)));
}

#[tokio::test(start_paused = true)]
async fn abandoned_request_still_populates_cache() {
    let renderer = ScriptedRenderer::slow(Duration::from_millis(500));
    let gateway = gateway(renderer.clone());

    let abandoned = tokio::time::timeout(Duration::from_millis(10), gateway.fetch(PAGE, None)).await;
    assert!(abandoned.is_err(), "caller gave up before the render finished");

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(gateway.cache().contains(PAGE));

    let served = document(gateway.fetch(PAGE, None).await.unwrap());
    assert_eq!(served.source, Source::Cache);
    assert_eq!(renderer.calls(), 1);
}

// ============================================================================
// Prewarm and purge
// ============================================================================

#[tokio::test]
async fn prewarm_renders_once() {
    let renderer = ScriptedRenderer::ok();
    let gateway = gateway(renderer.clone());

    let first = gateway.prewarm(PAGE).await.unwrap();
    let fingerprint = match first {
        Prewarm::Rendered(ref fingerprint) => fingerprint.clone(),
        Prewarm::AlreadyCached => panic!("cache was empty"),
    };
    assert!(!first.was_cached());
    assert_eq!(gateway.prewarm(PAGE).await.unwrap(), Prewarm::AlreadyCached);

    let served = document(gateway.fetch(PAGE, None).await.unwrap());
    assert_eq!(served.source, Source::Cache);
    assert_eq!(served.fingerprint, fingerprint);
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn prewarm_of_cached_key_neither_promotes_nor_counts_a_hit() {
    let gateway = gateway(ScriptedRenderer::ok());
    let other = "https://shop.test/other";

    document(gateway.fetch(PAGE, None).await.unwrap());
    document(gateway.fetch(other, None).await.unwrap());

    assert_eq!(gateway.prewarm(PAGE).await.unwrap(), Prewarm::AlreadyCached);
    assert!(gateway.prewarm_detached(PAGE).unwrap());

    assert_eq!(gateway.keys(2), vec![other, PAGE]);
    assert_eq!(gateway.cache().get(PAGE).unwrap().hit_count, 1);
}

#[tokio::test(start_paused = true)]
async fn prewarm_rerenders_expired_key() {
    let renderer = ScriptedRenderer::ok();
    let gateway = Prerender::builder()
        .renderer(renderer.clone())
        .cache(CacheConfig::new().ttl(Duration::from_secs(60)))
        .build()
        .unwrap();

    gateway.prewarm(PAGE).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;

    assert!(!gateway.prewarm(PAGE).await.unwrap().was_cached());
    assert_eq!(renderer.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn detached_prewarm_renders_in_background() {
    let renderer = ScriptedRenderer::slow(Duration::from_millis(200));
    let gateway = gateway(renderer.clone());

    assert!(!gateway.prewarm_detached(PAGE).unwrap());
    assert!(!gateway.cache().contains(PAGE));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(gateway.cache().contains(PAGE));
    assert!(gateway.prewarm_detached(PAGE).unwrap());
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test]
async fn detached_prewarm_validates_key() {
    let gateway = gateway(ScriptedRenderer::ok());
    assert!(matches!(
        gateway.prewarm_detached("mailto:someone@shop.test"),
        Err(PrerenderError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn purge_forces_rerender() {
    let renderer = ScriptedRenderer::ok();
    let gateway = gateway(renderer.clone());

    document(gateway.fetch(PAGE, None).await.unwrap());
    assert!(gateway.purge(PAGE));
    assert!(!gateway.purge(PAGE));

    let rendered = document(gateway.fetch(PAGE, None).await.unwrap());
    assert_eq!(rendered.source, Source::Render);
    assert_eq!(renderer.calls(), 2);
}

// ============================================================================
// Stats
// ============================================================================

#[tokio::test]
async fn stats_and_keys_reflect_activity() {
    let gateway = gateway(ScriptedRenderer::ok());
    for i in 0..3 {
        gateway
            .fetch(&format!("https://shop.test/{i}"), None)
            .await
            .unwrap();
    }
    tokio::task::yield_now().await;

    let stats = gateway.stats();
    assert_eq!(stats.cache.entries, 3);
    assert_eq!(stats.queue.submitted, 3);
    assert_eq!(stats.inflight, 0);

    assert_eq!(
        gateway.keys(2),
        vec!["https://shop.test/2", "https://shop.test/1"]
    );
}

/// maxEntries=1, ttl=1000ms through the full request path.
#[tokio::test(start_paused = true)]
async fn single_slot_gateway_end_to_end() {
    let renderer = ScriptedRenderer::ok();
    let gateway = Prerender::builder()
        .renderer(renderer.clone())
        .cache(
            CacheConfig::new()
                .max_entries(1)
                .ttl(Duration::from_millis(1000)),
        )
        .build()
        .unwrap();
    let a = "https://shop.test/a";
    let b = "https://shop.test/b";

    assert_eq!(document(gateway.fetch(a, None).await.unwrap()).source, Source::Render);
    assert_eq!(document(gateway.fetch(a, None).await.unwrap()).source, Source::Cache);
    assert_eq!(document(gateway.fetch(b, None).await.unwrap()).source, Source::Render);
    assert_eq!(renderer.calls(), 2);

    // B evicted A.
    assert_eq!(document(gateway.fetch(a, None).await.unwrap()).source, Source::Render);
    assert_eq!(renderer.calls(), 3);

    tokio::time::advance(Duration::from_millis(1001)).await;
    assert_eq!(document(gateway.fetch(a, None).await.unwrap()).source, Source::Render);
    assert_eq!(renderer.calls(), 4);
}

// ============================================================================
// Single-flight
// ============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_misses_render_separately_by_default() {
    let renderer = ScriptedRenderer::slow(Duration::from_millis(100));
    let gateway = gateway(renderer.clone());

    let results = join_all((0..3).map(|_| gateway.fetch(PAGE, None))).await;
    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(renderer.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn dedupe_inflight_shares_one_render() {
    let renderer = ScriptedRenderer::slow(Duration::from_millis(100));
    let gateway = Prerender::builder()
        .renderer(renderer.clone())
        .dedupe_inflight(true)
        .build()
        .unwrap();

    let results = join_all((0..5).map(|_| gateway.fetch(PAGE, None))).await;
    let fingerprints: Vec<_> = results
        .into_iter()
        .map(|r| document(r.unwrap()).fingerprint)
        .collect();

    assert_eq!(renderer.calls(), 1);
    assert!(fingerprints.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(gateway.stats().inflight, 0);
}

#[tokio::test(start_paused = true)]
async fn dedupe_inflight_forgets_render_abandoned_by_every_caller() {
    let renderer = ScriptedRenderer::slow(Duration::from_millis(500));
    let gateway = Prerender::builder()
        .renderer(renderer.clone())
        .cache(CacheConfig::new().ttl(Duration::from_secs(60)))
        .dedupe_inflight(true)
        .build()
        .unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), gateway.fetch(PAGE, None)).await;
    assert!(abandoned.is_err(), "caller gave up before the render finished");
    assert_eq!(gateway.stats().inflight, 1);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(gateway.stats().inflight, 0);
    assert!(gateway.cache().contains(PAGE));
    assert_eq!(renderer.calls(), 1);

    // Once the entry expires, the next miss renders afresh.
    tokio::time::sleep(Duration::from_secs(120)).await;
    let rendered = document(gateway.fetch(PAGE, None).await.unwrap());
    assert_eq!(rendered.source, Source::Render);
    assert_eq!(rendered.artifact, format!("<html>{PAGE} #2</html>"));
    assert_eq!(renderer.calls(), 2);
    assert!(gateway.cache().contains(PAGE));
    assert_eq!(gateway.stats().inflight, 0);
}

#[tokio::test(start_paused = true)]
async fn dedupe_inflight_shares_failure_then_forgets_it() {
    let renderer = ScriptedRenderer::failing(1, PrerenderError::RenderFailure("boom".into()));
    let gateway = Prerender::builder()
        .renderer(renderer.clone())
        .dedupe_inflight(true)
        .build()
        .unwrap();

    let results = join_all((0..3).map(|_| gateway.fetch(PAGE, None))).await;
    assert!(results.iter().all(|r| r.is_err()));
    assert_eq!(renderer.calls(), 1);

    // The failure is not remembered: the next miss renders afresh.
    assert!(gateway.fetch(PAGE, None).await.is_ok());
    assert_eq!(renderer.calls(), 2);
}

// ============================================================================
// Retry
// ============================================================================

#[tokio::test(start_paused = true)]
async fn retries_transient_failures_when_enabled() {
    let renderer = ScriptedRenderer::failing(2, PrerenderError::RenderFailure("flaky".into()));
    let gateway = Prerender::builder()
        .renderer(renderer.clone())
        .retry(
            RetryConfig::new()
                .max_attempts(3)
                .initial_delay(Duration::from_millis(100)),
        )
        .build()
        .unwrap();

    let rendered = document(gateway.fetch(PAGE, None).await.unwrap());
    assert_eq!(rendered.source, Source::Render);
    assert_eq!(renderer.calls(), 3);
    assert_eq!(gateway.stats().queue.submitted, 3);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts() {
    let renderer = ScriptedRenderer::failing(10, PrerenderError::RenderFailure("down".into()));
    let gateway = Prerender::builder()
        .renderer(renderer.clone())
        .retry(RetryConfig::new().max_attempts(2))
        .build()
        .unwrap();

    assert!(gateway.fetch(PAGE, None).await.is_err());
    assert_eq!(renderer.calls(), 2);
    assert!(gateway.cache().is_empty());
}

#[tokio::test]
async fn no_retry_by_default() {
    let renderer = ScriptedRenderer::failing(1, PrerenderError::RenderFailure("once".into()));
    let gateway = gateway(renderer.clone());

    assert!(gateway.fetch(PAGE, None).await.is_err());
    assert_eq!(renderer.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn permanent_errors_are_not_retried() {
    let renderer =
        ScriptedRenderer::failing(1, PrerenderError::InvalidRequest("blocked host".into()));
    let gateway = Prerender::builder()
        .renderer(renderer.clone())
        .retry(RetryConfig::new().max_attempts(5))
        .build()
        .unwrap();

    assert!(matches!(
        gateway.fetch(PAGE, None).await,
        Err(PrerenderError::InvalidRequest(_))
    ));
    assert_eq!(renderer.calls(), 1);
}
