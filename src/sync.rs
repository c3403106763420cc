//! Poison-tolerant lock acquisition.
//!
//! The cache and the admission queue keep plain data behind a `std::sync::Mutex`
//! and never hold it across an `.await`. A panic inside a render job cannot
//! poison either lock, but a panic in a caller-supplied closure elsewhere could;
//! in that case the state is still structurally valid, so we recover it and log.

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                result = "poisoned_recovered",
                "recovered from poisoned lock"
            );
            poisoned.into_inner()
        }
    }
}
