//! Renderer contract.
//!
//! A [`Renderer`] turns a URL into serialized HTML. Rendering is the only
//! expensive step in the system; everything else exists to call it less
//! often and never too many times at once.
//!
//! Implementations must be time-bounded: a render either returns or fails
//! within `readiness_timeout + settle_delay + bounded overhead`. The
//! admission queue relies on this for throughput, since it never times a
//! job out itself.
//!
//! # Errors
//!
//! - [`RenderTimeout`](crate::PrerenderError::RenderTimeout) - the readiness
//!   condition was never met in time
//! - [`RenderFailure`](crate::PrerenderError::RenderFailure) - navigation or
//!   execution error from the engine

pub mod remote;
pub mod retry;

pub use remote::RemoteRenderer;
pub use retry::RetryConfig;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{PrerenderError, Result};

/// Produces an HTML document for a URL.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renderer name for logging/metrics.
    fn name(&self) -> &str;

    /// Render `url` and return the serialized document.
    async fn render(&self, url: &str, config: &RenderConfig) -> Result<String>;
}

/// Resource categories a renderer may refuse to fetch to speed up loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Image,
    Font,
    Stylesheet,
    Media,
    Script,
}

impl ResourceType {
    /// Lowercase wire name, as used by headless browser protocols.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Font => "font",
            ResourceType::Stylesheet => "stylesheet",
            ResourceType::Media => "media",
            ResourceType::Script => "script",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = PrerenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "image" => Ok(ResourceType::Image),
            "font" => Ok(ResourceType::Font),
            "stylesheet" => Ok(ResourceType::Stylesheet),
            "media" => Ok(ResourceType::Media),
            "script" => Ok(ResourceType::Script),
            other => Err(PrerenderError::Configuration(format!(
                "unknown resource type '{other}'"
            ))),
        }
    }
}

/// How a page is rendered.
///
/// ```rust
/// # use prerender::render::{RenderConfig, ResourceType};
/// # use std::time::Duration;
/// let config = RenderConfig::new()
///     .readiness_selector("#app[data-ready]")
///     .readiness_timeout(Duration::from_secs(10))
///     .block(ResourceType::Media);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// CSS selector that must match before the page counts as ready.
    /// `None` waits for network idle only.
    pub readiness_selector: Option<String>,
    /// How long to wait for readiness. Default: 15s.
    pub readiness_timeout: Duration,
    /// Extra wait after readiness for late DOM updates. Default: 250ms.
    pub settle_delay: Duration,
    /// Resource types not fetched during the render.
    /// Default: images, fonts and stylesheets.
    pub blocked_resource_types: BTreeSet<ResourceType>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            readiness_selector: None,
            readiness_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_millis(250),
            blocked_resource_types: [
                ResourceType::Image,
                ResourceType::Font,
                ResourceType::Stylesheet,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl RenderConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for `selector` to match before serializing.
    pub fn readiness_selector(mut self, selector: impl Into<String>) -> Self {
        self.readiness_selector = Some(selector.into());
        self
    }

    /// Set the readiness timeout.
    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Set the post-readiness settle delay.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Add a blocked resource type.
    pub fn block(mut self, resource: ResourceType) -> Self {
        self.blocked_resource_types.insert(resource);
        self
    }

    /// Replace the blocked resource types.
    pub fn blocked_resource_types(mut self, types: impl IntoIterator<Item = ResourceType>) -> Self {
        self.blocked_resource_types = types.into_iter().collect();
        self
    }

    /// Upper bound on the renderer-side wait (readiness plus settle).
    pub fn render_budget(&self) -> Duration {
        self.readiness_timeout.saturating_add(self.settle_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_blocks_heavy_static_assets() {
        let config = RenderConfig::default();
        assert!(config.blocked_resource_types.contains(&ResourceType::Image));
        assert!(config.blocked_resource_types.contains(&ResourceType::Font));
        assert!(config.blocked_resource_types.contains(&ResourceType::Stylesheet));
        assert!(!config.blocked_resource_types.contains(&ResourceType::Script));
    }

    #[test]
    fn render_budget_adds_settle_delay() {
        let config = RenderConfig::new()
            .readiness_timeout(Duration::from_secs(2))
            .settle_delay(Duration::from_millis(500));
        assert_eq!(config.render_budget(), Duration::from_millis(2500));
    }

    #[test]
    fn resource_type_round_trips_through_str() {
        for ty in [
            ResourceType::Image,
            ResourceType::Font,
            ResourceType::Stylesheet,
            ResourceType::Media,
            ResourceType::Script,
        ] {
            assert_eq!(ty.as_str().parse::<ResourceType>().unwrap(), ty);
        }
    }

    #[test]
    fn unknown_resource_type_is_a_config_error() {
        let err = "websocket".parse::<ResourceType>().unwrap_err();
        assert!(matches!(err, PrerenderError::Configuration(_)));
    }

    #[test]
    fn resource_type_deserializes_lowercase() {
        let ty: ResourceType = serde_json::from_str("\"stylesheet\"").unwrap();
        assert_eq!(ty, ResourceType::Stylesheet);
    }
}
