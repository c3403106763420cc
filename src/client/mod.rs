//! Client library for talking to prerenderd.
//!
//! Provides [`ServiceClient`], a thin wrapper over the daemon's HTTP routes
//! used by `prctl`.

mod service_client;

pub use service_client::{Fetched, Health, ServiceClient};
