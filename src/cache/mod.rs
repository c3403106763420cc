//! Caching subsystem.
//!
//! - [`RenderCache`] - bounded TTL + LRU store of rendered documents, keyed
//!   on the requested URL string. See the [`render`] module docs for the
//!   expiry and eviction rules.
//! - [`Fingerprint`] - content digest attached to every entry and served as
//!   a weak `ETag` for conditional requests.

pub mod fingerprint;
pub mod render;

pub use fingerprint::Fingerprint;
pub use render::{CacheConfig, CacheEntry, CacheStats, RenderCache};
