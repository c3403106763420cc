//! Configuration loading for prerenderd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.prerender/config.toml` (user)
//! 3. `/etc/prerender/config.toml` (system)
//!
//! An explicit path that does not exist is an error. With no explicit path
//! and no file in the standard locations, built-in defaults are used.
//! Every section and field is optional.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::render::remote::DEFAULT_ENDPOINT;
use crate::render::{RenderConfig, ResourceType, RetryConfig};
use crate::{CacheConfig, PrerenderError, QueueConfig, Result};

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub queue: QueueSection,
    #[serde(default)]
    pub renderer: RendererSection,
    #[serde(default)]
    pub retry: RetrySection,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8686).
    #[serde(default = "default_address")]
    pub address: String,
    /// Keys listed by `/stats` when the request gives no limit (default: 50).
    #[serde(default = "default_stats_keys")]
    pub stats_keys: usize,
    /// Hard cap on keys listed by `/stats` (default: 1000).
    #[serde(default = "default_stats_keys_max")]
    pub stats_keys_max: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            stats_keys: default_stats_keys(),
            stats_keys_max: default_stats_keys_max(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8686".to_string()
}

fn default_stats_keys() -> usize {
    50
}

fn default_stats_keys_max() -> usize {
    1_000
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Maximum stored renders (default: 500).
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Seconds a render stays fresh (default: 3600).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_max_entries() -> usize {
    500
}

fn default_ttl_secs() -> u64 {
    3_600
}

impl From<&CacheSection> for CacheConfig {
    fn from(section: &CacheSection) -> Self {
        CacheConfig::new()
            .max_entries(section.max_entries)
            .ttl(Duration::from_secs(section.ttl_secs))
    }
}

/// `[queue]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSection {
    /// Renders allowed to run at once (default: 4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Share one render between concurrent misses for a key (default: false).
    #[serde(default)]
    pub dedupe_inflight: bool,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            dedupe_inflight: false,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

impl From<&QueueSection> for QueueConfig {
    fn from(section: &QueueSection) -> Self {
        QueueConfig::new().concurrency(section.concurrency)
    }
}

/// `[renderer]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RendererSection {
    /// Base URL of the rendering service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// CSS selector marking the page as ready (default: none).
    #[serde(default)]
    pub readiness_selector: Option<String>,
    /// Milliseconds to wait for readiness (default: 15000).
    #[serde(default = "default_readiness_timeout_ms")]
    pub readiness_timeout_ms: u64,
    /// Milliseconds to wait after readiness (default: 250).
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Resource types not fetched while rendering
    /// (default: image, font, stylesheet).
    #[serde(default = "default_blocked")]
    pub blocked_resource_types: Vec<ResourceType>,
}

impl Default for RendererSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            readiness_selector: None,
            readiness_timeout_ms: default_readiness_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            blocked_resource_types: default_blocked(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_readiness_timeout_ms() -> u64 {
    15_000
}

fn default_settle_delay_ms() -> u64 {
    250
}

fn default_blocked() -> Vec<ResourceType> {
    vec![
        ResourceType::Image,
        ResourceType::Font,
        ResourceType::Stylesheet,
    ]
}

impl From<&RendererSection> for RenderConfig {
    fn from(section: &RendererSection) -> Self {
        let mut config = RenderConfig::new()
            .readiness_timeout(Duration::from_millis(section.readiness_timeout_ms))
            .settle_delay(Duration::from_millis(section.settle_delay_ms))
            .blocked_resource_types(section.blocked_resource_types.iter().copied());
        if let Some(ref selector) = section.readiness_selector {
            config = config.readiness_selector(selector.clone());
        }
        config
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Attempts per miss, including the first (default: 1, no retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Milliseconds before the first retry (default: 500).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Cap on the backoff delay in milliseconds (default: 10000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        RetryConfig::new()
            .max_attempts(section.max_attempts)
            .initial_delay(Duration::from_millis(section.initial_delay_ms))
            .max_delay(Duration::from_millis(section.max_delay_ms))
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.prerender/config.toml`
    /// 3. `/etc/prerender/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => {
                info!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a specific config file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PrerenderError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            PrerenderError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Resolve the config file path, if any.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(PrerenderError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".prerender").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/prerender/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        CacheConfig::from(&self.cache).validate()?;
        QueueConfig::from(&self.queue).validate()?;
        if self.server.stats_keys > self.server.stats_keys_max {
            return Err(PrerenderError::Configuration(format!(
                "server.stats_keys ({}) exceeds server.stats_keys_max ({})",
                self.server.stats_keys, self.server.stats_keys_max
            )));
        }
        Ok(())
    }
}
