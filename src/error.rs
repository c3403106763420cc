//! Prerender error types

use std::time::Duration;

/// Prerender error types
///
/// `Clone` so that a single render outcome can be handed to every caller
/// waiting on the same in-flight job.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PrerenderError {
    // Renderer errors
    /// The readiness condition was not met within the renderer's bound.
    #[error("render timed out after {timeout:?}: {url}")]
    RenderTimeout { url: String, timeout: Duration },

    /// Navigation or execution error reported by the rendering engine.
    #[error("render failed: {0}")]
    RenderFailure(String),

    // Boundary errors
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The job was dropped before it produced a result (its task panicked
    /// or the runtime shut down underneath it).
    #[error("render job aborted before completion")]
    JobAborted,

    // Transport errors (control client)
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PrerenderError {
    /// Whether retrying the same render could plausibly succeed.
    ///
    /// Timeouts, engine failures and aborted jobs are transient; malformed
    /// requests and configuration problems are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PrerenderError::RenderTimeout { .. }
                | PrerenderError::RenderFailure(_)
                | PrerenderError::JobAborted
        )
    }
}

impl From<serde_json::Error> for PrerenderError {
    fn from(err: serde_json::Error) -> Self {
        PrerenderError::Http(format!("JSON error: {err}"))
    }
}

/// Result type alias for Prerender operations
pub type Result<T> = std::result::Result<T, PrerenderError>;
