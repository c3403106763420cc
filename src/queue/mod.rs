//! Bounded-concurrency FIFO admission queue.
//!
//! [`AdmissionQueue`] caps how many expensive jobs (renders) run at once.
//! Work beyond the cap waits in a FIFO list and is started, head first, as
//! soon as a slot frees up.
//!
//! # Scheduling
//!
//! ```text
//!  submit(job) ──► pending: [J4, J5, J6] ──► running: {J1, J2, J3}   (concurrency = 3)
//!                       ▲                            │
//!                       └──── slot released ◄────────┘
//! ```
//!
//! - `submit` never blocks: it enqueues, kicks the scheduler and returns a
//!   [`JobHandle`].
//! - A started job is spawned onto the tokio runtime. When it finishes, by
//!   success, failure or panic, its slot is released and the scheduler
//!   immediately starts further pending jobs until the list is empty or the
//!   cap is reached again.
//! - Jobs start in submission order; completion order is whatever the jobs
//!   make it.
//! - The queue never retries, deduplicates or cancels. A failure resolves
//!   only its own handle.

mod handle;

pub use handle::JobHandle;

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::sync::mutex_lock;
use crate::telemetry;
use crate::{PrerenderError, Result};

const SOURCE: &str = "queue";

/// Configuration for the admission queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of jobs running at once. Must be at least 1. Default: 4.
    pub concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

impl QueueConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency bound.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    /// Reject configurations the queue cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(PrerenderError::Configuration(
                "queue concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub concurrency: usize,
    pub running: usize,
    pub pending: usize,
    /// Jobs ever submitted.
    pub submitted: u64,
    /// Jobs that have released their slot.
    pub completed: u64,
}

/// A type-erased job, ready to be spawned once admitted.
type PendingJob = Pin<Box<dyn Future<Output = ()> + Send>>;

struct QueueState {
    pending: VecDeque<(u64, PendingJob)>,
    running: usize,
    next_id: u64,
    completed: u64,
}

struct Inner {
    concurrency: usize,
    state: Mutex<QueueState>,
}

/// FIFO scheduler with a fixed concurrency bound.
///
/// Cheap to clone; clones share the same pending list and slots.
#[derive(Clone)]
pub struct AdmissionQueue {
    inner: Arc<Inner>,
}

impl AdmissionQueue {
    /// Create an idle queue.
    ///
    /// Fails if `config.concurrency` is zero.
    pub fn new(config: &QueueConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                concurrency: config.concurrency,
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    running: 0,
                    next_id: 0,
                    completed: 0,
                }),
            }),
        })
    }

    /// Enqueue a job and return a handle to its result.
    ///
    /// `job` is not called until the job is admitted, so nothing expensive
    /// happens while it waits in line.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context: admitted jobs are spawned onto it.
    pub fn submit<T, F, Fut>(&self, job: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task: PendingJob = Box::pin(async move {
            let result = job().await;
            // The caller may have dropped its handle; the result is discarded.
            let _ = tx.send(result);
        });

        let id = {
            let mut state = mutex_lock(&self.inner.state, SOURCE, "submit");
            let id = state.next_id;
            state.next_id += 1;
            state.pending.push_back((id, task));
            metrics::gauge!(telemetry::QUEUE_PENDING).set(state.pending.len() as f64);
            id
        };
        trace!(job = id, "job enqueued");

        Inner::drain(&self.inner);
        JobHandle::new(id, rx)
    }

    /// Configured concurrency bound.
    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// Jobs currently holding a slot.
    pub fn running(&self) -> usize {
        mutex_lock(&self.inner.state, SOURCE, "running").running
    }

    /// Jobs waiting for a slot.
    pub fn pending(&self) -> usize {
        mutex_lock(&self.inner.state, SOURCE, "pending").pending.len()
    }

    /// Current queue occupancy.
    pub fn stats(&self) -> QueueStats {
        let state = mutex_lock(&self.inner.state, SOURCE, "stats");
        QueueStats {
            concurrency: self.inner.concurrency,
            running: state.running,
            pending: state.pending.len(),
            submitted: state.next_id,
            completed: state.completed,
        }
    }
}

impl Inner {
    /// Start pending jobs until the list is empty or every slot is taken.
    fn drain(this: &Arc<Self>) {
        loop {
            let (id, job) = {
                let mut state = mutex_lock(&this.state, SOURCE, "drain");
                if state.running >= this.concurrency {
                    return;
                }
                let Some(next) = state.pending.pop_front() else {
                    return;
                };
                state.running += 1;
                metrics::gauge!(telemetry::QUEUE_RUNNING).set(state.running as f64);
                metrics::gauge!(telemetry::QUEUE_PENDING).set(state.pending.len() as f64);
                next
            };
            debug!(job = id, "job admitted");

            let slot = SlotGuard {
                queue: Arc::clone(this),
                id,
            };
            tokio::spawn(async move {
                job.await;
                drop(slot);
            });
        }
    }

    fn release(this: &Arc<Self>, id: u64) {
        {
            let mut state = mutex_lock(&this.state, SOURCE, "release");
            state.running -= 1;
            state.completed += 1;
            metrics::gauge!(telemetry::QUEUE_RUNNING).set(state.running as f64);
        }
        metrics::counter!(telemetry::QUEUE_COMPLETED_TOTAL).increment(1);
        trace!(job = id, "slot released");
        Self::drain(this);
    }
}

/// Holds one concurrency slot; releasing happens on drop so a panicking
/// job still frees its slot and lets the next job start.
struct SlotGuard {
    queue: Arc<Inner>,
    id: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        Inner::release(&self.queue, self.id);
    }
}
