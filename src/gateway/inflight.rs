//! Single-flight tracking of in-progress renders.
//!
//! When enabled, concurrent misses for the same key share one render job
//! instead of each taking a queue slot. The first miss for a key starts
//! the render; later misses arriving before it finishes await the same
//! shared future.
//!
//! Each shared render is driven by its own task and removes its map entry
//! when it completes, so callers that give up never leave an entry behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::Rendered;
use crate::sync::mutex_lock;
use crate::telemetry;
use crate::Result;

const SOURCE: &str = "gateway::inflight";

type SharedRender = Shared<BoxFuture<'static, Result<Rendered>>>;
type RenderMap = Arc<Mutex<HashMap<String, (u64, SharedRender)>>>;

/// Map from key to the render currently producing it.
///
/// Each entry carries a generation number so a finished render only
/// removes its own entry, never a newer one started after it.
#[derive(Default)]
pub(crate) struct InflightRenders {
    renders: RenderMap,
    next_generation: AtomicU64,
}

impl InflightRenders {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Await the in-flight render for `key`, starting one with `start` if
    /// there is none.
    ///
    /// `start` must be lazy: it is called with the map locked and only has
    /// to build the future, not poll it.
    pub(crate) async fn run<F>(&self, key: &str, start: F) -> Result<Rendered>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Rendered>>,
    {
        let (render, started) = {
            let mut renders = mutex_lock(&self.renders, SOURCE, "run");
            match renders.get(key) {
                Some((_, render)) => {
                    debug!(key, "joining in-flight render");
                    metrics::counter!(telemetry::INFLIGHT_JOINS_TOTAL).increment(1);
                    (render.clone(), false)
                }
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let render = finish_and_forget(
                        Arc::clone(&self.renders),
                        key.to_string(),
                        generation,
                        start(),
                    )
                    .boxed()
                    .shared();
                    renders.insert(key.to_string(), (generation, render.clone()));
                    (render, true)
                }
            }
        };

        if started {
            tokio::spawn(render.clone());
        }
        render.await
    }

    /// Keys with a render currently in flight.
    pub(crate) fn len(&self) -> usize {
        mutex_lock(&self.renders, SOURCE, "len").len()
    }
}

/// Run `render`, then drop the map entry for `key` if it is still ours.
async fn finish_and_forget(
    renders: RenderMap,
    key: String,
    generation: u64,
    render: BoxFuture<'static, Result<Rendered>>,
) -> Result<Rendered> {
    let result = render.await;

    let mut renders = mutex_lock(&renders, SOURCE, "finish");
    if renders
        .get(&key)
        .is_some_and(|(current, _)| *current == generation)
    {
        renders.remove(&key);
    }
    result
}
