//! [`ServiceClient`] - HTTP client for a running prerenderd.

use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::version::user_agent;
use crate::{PrerenderError, Result};

/// Liveness report from `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
}

/// Result of [`ServiceClient::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// The server confirmed the validator; no body was sent.
    NotModified { etag: Option<String> },
    /// The rendered document.
    Document {
        body: String,
        etag: Option<String>,
        /// `HIT` or `MISS`, as reported by the server.
        cache_status: Option<String>,
    },
}

#[derive(Deserialize)]
struct PurgeBody {
    purged: bool,
}

#[derive(Deserialize)]
struct PrewarmBody {
    cached: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for the prerenderd HTTP API.
#[derive(Clone)]
pub struct ServiceClient {
    http: Client,
    base: String,
}

impl ServiceClient {
    /// Create a client for the server at `base` (e.g. `http://127.0.0.1:8686`).
    ///
    /// No connection is made until the first request.
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent())
            .build()
            .map_err(|e| PrerenderError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Server base URL.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub async fn health(&self) -> Result<Health> {
        let response = send(self.http.get(self.url("/health"))).await?;
        json(response).await
    }

    /// Cache and queue statistics with up to `keys` sampled keys.
    pub async fn stats(&self, keys: Option<usize>) -> Result<serde_json::Value> {
        let mut request = self.http.get(self.url("/stats"));
        if let Some(keys) = keys {
            request = request.query(&[("keys", keys)]);
        }
        json(send(request).await?).await
    }

    /// Fetch the render for `url`, optionally conditional on `if_none_match`.
    pub async fn get(&self, url: &str, if_none_match: Option<&str>) -> Result<Fetched> {
        let mut request = self.http.get(self.url("/render")).query(&[("url", url)]);
        if let Some(validator) = if_none_match {
            request = request.header(IF_NONE_MATCH, validator);
        }
        let response = send(request).await?;

        let etag = header_string(&response, ETAG.as_str());
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(Fetched::NotModified { etag });
        }
        let cache_status = header_string(&response, "x-prerender-cache");
        let body = response
            .text()
            .await
            .map_err(|e| PrerenderError::Http(e.to_string()))?;
        Ok(Fetched::Document {
            body,
            etag,
            cache_status,
        })
    }

    /// Drop the cached render for `url`. Returns whether one existed.
    pub async fn purge(&self, url: &str) -> Result<bool> {
        let request = self.http.delete(self.url("/cache")).query(&[("url", url)]);
        let body: PurgeBody = json(send(request).await?).await?;
        Ok(body.purged)
    }

    /// Ask the server to render `url` ahead of demand.
    ///
    /// Returns `true` if it was already cached.
    pub async fn prewarm(&self, url: &str) -> Result<bool> {
        let request = self.http.post(self.url("/prewarm")).query(&[("url", url)]);
        let body: PrewarmBody = json(send(request).await?).await?;
        Ok(body.cached)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

/// Send a request, turning error statuses into [`PrerenderError::Api`].
async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| PrerenderError::Http(e.to_string()))?;
    let status = response.status();
    if status.is_success() || status == StatusCode::NOT_MODIFIED {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(PrerenderError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| PrerenderError::Http(e.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn header_string(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
