//! Caller-side handle for a submitted job.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;
use tokio::sync::oneshot;

use crate::{PrerenderError, Result};

pin_project! {
    /// Resolves with the job's result once it has run.
    ///
    /// Dropping the handle does not cancel the job: it still occupies its
    /// slot and runs to completion, and its result is discarded.
    ///
    /// If the job never reports back (its task panicked, or the runtime
    /// shut down underneath it) the handle resolves to
    /// [`PrerenderError::JobAborted`].
    #[must_use = "a job handle does nothing unless awaited; the job runs either way"]
    pub struct JobHandle<T> {
        id: u64,
        #[pin]
        rx: oneshot::Receiver<Result<T>>,
    }
}

impl<T> JobHandle<T> {
    pub(super) fn new(id: u64, rx: oneshot::Receiver<Result<T>>) -> Self {
        Self { id, rx }
    }

    /// Submission sequence number, unique per queue.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().rx.poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PrerenderError::JobAborted)),
            Poll::Pending => Poll::Pending,
        }
    }
}
