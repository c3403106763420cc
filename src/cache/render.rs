//! TTL + LRU cache for rendered documents.
//!
//! [`RenderCache`] maps a resource key (the URL string exactly as requested)
//! to the last successful render of that key.
//!
//! # Expiry
//!
//! Freshness is checked lazily: an entry older than the configured TTL is
//! removed the next time a `get` reaches it. There is no background sweep,
//! so an expired entry that nobody reads keeps occupying a slot until it is
//! read or pushed out by LRU eviction. [`CacheStats::entries`] therefore
//! counts expired-but-unreaped entries too.
//!
//! # Eviction
//!
//! Every `set` is followed by evicting the least-recently-used key until the
//! entry count is back within `max_entries`. Recency is strict: both `get`
//! hits and `set` move a key to the most-recently-used end; hit counts and
//! payload sizes play no part.
//!
//! Lookup, promotion and victim selection are all O(1) via [`lru::LruCache`]
//! (a hash map over an intrusive doubly-linked recency list). The cache is
//! created unbounded and trimmed by hand so that every eviction is observed
//! and counted.

use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use lru::LruCache;
use tokio::time::Instant;
use tracing::debug;

use super::fingerprint::Fingerprint;
use crate::sync::mutex_lock;
use crate::telemetry;
use crate::{PrerenderError, Result};

const SOURCE: &str = "cache::render";

/// Configuration for the render cache.
///
/// ```rust
/// # use prerender::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(2_000)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of stored entries. Must be at least 1. Default: 500.
    pub max_entries: usize,
    /// Time-to-live measured from insertion. Default: 1 hour.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of stored entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for stored entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Reject configurations the cache cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(PrerenderError::Configuration(
                "cache max_entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A cached render.
///
/// `get` hands out clones; the artifact is a reference-counted [`Bytes`] so
/// cloning does not copy the document.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub artifact: Bytes,
    pub fingerprint: Fingerprint,
    /// Set on insertion, never touched afterwards.
    pub created_at: Instant,
    /// Successful reads since the entry was last `set`. Informational only.
    pub hit_count: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > ttl
    }

    /// Time elapsed since the entry was stored.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created_at)
    }
}

/// Point-in-time view of cache occupancy.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Stored entries, including expired ones not yet reaped.
    pub entries: usize,
    /// Sum of key and artifact lengths over stored entries.
    pub approx_bytes: usize,
    pub max_entries: usize,
    #[serde(rename = "ttl_secs", serialize_with = "serialize_secs")]
    pub ttl: Duration,
}

fn serialize_secs<S: serde::Serializer>(
    value: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}

/// In-memory TTL + LRU cache of rendered documents.
///
/// Thread-safe; each operation holds an internal mutex for its whole
/// duration, so operations are atomic with respect to one another.
pub struct RenderCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    max_entries: usize,
    ttl: Duration,
}

impl RenderCache {
    /// Create an empty cache.
    ///
    /// Fails if `config.max_entries` is zero.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: Mutex::new(LruCache::unbounded()),
            max_entries: config.max_entries,
            ttl: config.ttl,
        })
    }

    /// Look up a live entry.
    ///
    /// A hit promotes the key to most-recently-used and bumps its hit count.
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");

        let expired = match entries.peek(key) {
            Some(entry) => entry.is_expired(now, self.ttl),
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                return None;
            }
        };

        if expired {
            entries.pop(key);
            debug!(key, "expired entry reaped on read");
            metrics::counter!(telemetry::CACHE_REMOVALS_TOTAL, "reason" => "expired").increment(1);
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            return None;
        }

        let entry = entries.get_mut(key)?;
        entry.hit_count += 1;
        metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
        Some(entry.clone())
    }

    /// Insert or fully replace the entry for `key`.
    ///
    /// The entry becomes most-recently-used with a fresh `created_at` and a
    /// zero hit count. Least-recently-used keys are then evicted until the
    /// cache is back within capacity.
    pub fn set(&self, key: impl Into<String>, artifact: Bytes, fingerprint: Fingerprint) {
        let key = key.into();
        let entry = CacheEntry {
            key: key.clone(),
            artifact,
            fingerprint,
            created_at: Instant::now(),
            hit_count: 0,
        };

        let mut entries = mutex_lock(&self.entries, SOURCE, "set");
        entries.put(key, entry);

        while entries.len() > self.max_entries {
            let Some((victim, _)) = entries.pop_lru() else {
                break;
            };
            debug!(key = %victim, "evicted least-recently-used entry");
            metrics::counter!(telemetry::CACHE_REMOVALS_TOTAL, "reason" => "evicted").increment(1);
        }
    }

    /// Remove the entry for `key`, reporting whether one was stored.
    ///
    /// An expired-but-unreaped entry still counts as stored.
    pub fn delete(&self, key: &str) -> bool {
        let removed = mutex_lock(&self.entries, SOURCE, "delete")
            .pop(key)
            .is_some();
        if removed {
            metrics::counter!(telemetry::CACHE_REMOVALS_TOTAL, "reason" => "purged").increment(1);
        }
        removed
    }

    /// Whether a live entry exists, without promoting it or counting a hit.
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        mutex_lock(&self.entries, SOURCE, "contains")
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(now, self.ttl))
    }

    /// Current occupancy and limits.
    pub fn stats(&self) -> CacheStats {
        let entries = mutex_lock(&self.entries, SOURCE, "stats");
        let approx_bytes = entries
            .iter()
            .map(|(key, entry)| key.len() + entry.artifact.len())
            .sum();
        CacheStats {
            entries: entries.len(),
            approx_bytes,
            max_entries: self.max_entries,
            ttl: self.ttl,
        }
    }

    /// Live keys, most-recently-used first, truncated to `limit`.
    ///
    /// For diagnostics; does not reap or promote anything.
    pub fn keys(&self, limit: usize) -> Vec<String> {
        let now = Instant::now();
        mutex_lock(&self.entries, SOURCE, "keys")
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now, self.ttl))
            .map(|(key, _)| key.clone())
            .take(limit)
            .collect()
    }

    /// Stored entry count, including expired entries not yet reaped.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Configured capacity.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}
