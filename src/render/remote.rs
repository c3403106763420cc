//! Client for a remote headless-browser rendering service.
//!
//! Speaks the browserless-style `/content` API: the service navigates to
//! the URL, waits for the readiness selector, lets the page settle and
//! returns the serialized DOM.
//!
//! See: <https://docs.browserless.io/HTTP-APIs/content>

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::instrument;

use super::{RenderConfig, Renderer};
use crate::telemetry;
use crate::version::user_agent;
use crate::{PrerenderError, Result};

/// Default base URL of the rendering service.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000";

/// Slack on top of the render budget for navigation, serialization and
/// transfer. Bounds the total time a render can hold a queue slot.
const TRANSPORT_OVERHEAD: Duration = Duration::from_secs(5);

/// Renderer backed by a remote headless-browser service.
#[derive(Clone)]
pub struct RemoteRenderer {
    http: Client,
    endpoint: String,
    token: Option<String>,
}

impl RemoteRenderer {
    /// Create a renderer for the service at `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent())
            .build()
            .map_err(|e| PrerenderError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Authenticate against the service with `token`.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Base URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_status(
        status: StatusCode,
        url: &str,
        config: &RenderConfig,
        body: &str,
    ) -> PrerenderError {
        match status {
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                PrerenderError::RenderTimeout {
                    url: url.to_string(),
                    timeout: config.render_budget(),
                }
            }
            code => {
                let detail = body.trim();
                if detail.is_empty() {
                    PrerenderError::RenderFailure(format!("rendering service returned {code}"))
                } else {
                    PrerenderError::RenderFailure(format!(
                        "rendering service returned {code}: {detail}"
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl Renderer for RemoteRenderer {
    fn name(&self) -> &str {
        "remote"
    }

    #[instrument(name = "remote.render", skip(self, config), fields(endpoint = %self.endpoint))]
    async fn render(&self, url: &str, config: &RenderConfig) -> Result<String> {
        let request = ContentRequest::new(url, config);
        let budget = config.render_budget() + TRANSPORT_OVERHEAD;

        let mut builder = self
            .http
            .post(format!("{}/content", self.endpoint))
            .timeout(budget)
            .json(&request);
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token);
        }

        let start = Instant::now();
        let outcome = async {
            let response = builder.send().await.map_err(|e| {
                if e.is_timeout() {
                    PrerenderError::RenderTimeout {
                        url: url.to_string(),
                        timeout: budget,
                    }
                } else {
                    PrerenderError::RenderFailure(e.to_string())
                }
            })?;

            let status = response.status();
            let body = response.text().await.map_err(|e| {
                if e.is_timeout() {
                    PrerenderError::RenderTimeout {
                        url: url.to_string(),
                        timeout: budget,
                    }
                } else {
                    PrerenderError::RenderFailure(e.to_string())
                }
            })?;

            if !status.is_success() {
                return Err(Self::map_status(status, url, config, &body));
            }
            Ok(body)
        }
        .await;

        metrics::histogram!(telemetry::RENDER_DURATION_SECONDS, "renderer" => "remote")
            .record(start.elapsed().as_secs_f64());
        outcome
    }
}

/// Request body for the `/content` endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_for_selector: Option<WaitForSelector<'a>>,
    /// Milliseconds to wait after readiness.
    wait_for_timeout: u64,
    reject_resource_types: Vec<&'static str>,
    goto_options: GotoOptions,
}

#[derive(Debug, Serialize)]
struct WaitForSelector<'a> {
    selector: &'a str,
    timeout: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GotoOptions {
    wait_until: &'static str,
    timeout: u64,
}

impl<'a> ContentRequest<'a> {
    fn new(url: &'a str, config: &'a RenderConfig) -> Self {
        let readiness_ms = config.readiness_timeout.as_millis() as u64;
        Self {
            url,
            wait_for_selector: config
                .readiness_selector
                .as_deref()
                .map(|selector| WaitForSelector {
                    selector,
                    timeout: readiness_ms,
                }),
            wait_for_timeout: config.settle_delay.as_millis() as u64,
            reject_resource_types: config
                .blocked_resource_types
                .iter()
                .map(|ty| ty.as_str())
                .collect(),
            goto_options: GotoOptions {
                wait_until: "networkidle2",
                timeout: readiness_ms,
            },
        }
    }
}
