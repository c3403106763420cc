//! prerenderd server pieces.
//!
//! - HTTP routes over a [`RenderGateway`](crate::RenderGateway) (`http`)
//! - TOML configuration and its mapping onto the library configs (`config`)

pub mod config;
pub mod http;

pub use config::Config;
pub use http::{StatsLimits, router};

use crate::{Prerender, RenderGateway, Result};

/// Build a gateway backed by the remote renderer described by `config`.
///
/// `token` authenticates against the rendering service; it is kept out of
/// the config file.
pub fn build_gateway(config: &Config, token: Option<&str>) -> Result<RenderGateway> {
    config.validate()?;
    let mut builder = Prerender::builder()
        .remote(config.renderer.endpoint.clone())
        .cache((&config.cache).into())
        .queue((&config.queue).into())
        .render_config((&config.renderer).into())
        .retry((&config.retry).into())
        .dedupe_inflight(config.queue.dedupe_inflight);
    if let Some(token) = token {
        builder = builder.remote_token(token);
    }
    builder.build()
}

impl From<&config::ServerConfig> for StatsLimits {
    fn from(server: &config::ServerConfig) -> Self {
        Self {
            default_keys: server.stats_keys,
            max_keys: server.stats_keys_max,
        }
    }
}
