//! Telemetry metric name constants.
//!
//! Centralised metric names for prerender operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `prerender_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `renderer` - renderer name (e.g. "remote")
//! - `status` - outcome: "ok" or "error"
//! - `reason` - why an entry left the cache: "expired", "evicted", "purged"

/// Total cache hits (live entry served).
pub const CACHE_HITS_TOTAL: &str = "prerender_cache_hits_total";

/// Total cache misses (absent or expired).
pub const CACHE_MISSES_TOTAL: &str = "prerender_cache_misses_total";

/// Total entries removed from the cache.
///
/// Labels: `reason` ("expired" | "evicted" | "purged").
pub const CACHE_REMOVALS_TOTAL: &str = "prerender_cache_removals_total";

/// Conditional requests answered without a body.
pub const NOT_MODIFIED_TOTAL: &str = "prerender_not_modified_total";

/// Total render attempts dispatched to the renderer.
///
/// Labels: `renderer`, `status` ("ok" | "error").
pub const RENDERS_TOTAL: &str = "prerender_renders_total";

/// Render duration in seconds, measured inside the worker slot.
///
/// Labels: `renderer`.
pub const RENDER_DURATION_SECONDS: &str = "prerender_render_duration_seconds";

/// Total retry attempts (not counting the initial submission).
pub const RETRIES_TOTAL: &str = "prerender_retries_total";

/// Misses that joined an already in-flight render instead of submitting one.
pub const INFLIGHT_JOINS_TOTAL: &str = "prerender_inflight_joins_total";

/// Jobs currently holding a concurrency slot.
pub const QUEUE_RUNNING: &str = "prerender_queue_running";

/// Jobs waiting for a concurrency slot.
pub const QUEUE_PENDING: &str = "prerender_queue_pending";

/// Jobs that released their slot (success, failure or panic).
pub const QUEUE_COMPLETED_TOTAL: &str = "prerender_queue_completed_total";
