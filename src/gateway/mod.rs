//! Gateway implementations

mod builder;
mod inflight;
mod orchestrator;

pub use builder::{Prerender, PrerenderBuilder};
pub use orchestrator::{
    GatewayStats, Lookup, Prewarm, RenderGateway, Rendered, Source, validate_key,
};
