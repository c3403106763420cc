//! HTTP surface for prerenderd.
//!
//! | Route                  | Purpose                                        |
//! |------------------------|------------------------------------------------|
//! | `GET /render?url=`     | serve a render, honouring `If-None-Match`      |
//! | `DELETE /cache?url=`   | purge one key                                  |
//! | `POST /prewarm?url=`   | render ahead of demand, in the background      |
//! | `GET /stats?keys=`     | cache and queue statistics plus a key sample   |
//! | `GET /health`          | liveness                                       |
//!
//! Errors are returned as `{"error": "..."}` with a status derived from the
//! [`PrerenderError`] variant.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::gateway::{GatewayStats, Lookup, RenderGateway, Source};
use crate::version::PKG_VERSION;
use crate::{PrerenderError, validate_key};

/// Header reporting whether a response came from the cache.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-prerender-cache");

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Limits applied to the `/stats` key sample.
#[derive(Debug, Clone, Copy)]
pub struct StatsLimits {
    /// Keys listed when the request names no limit.
    pub default_keys: usize,
    /// Hard cap regardless of what the request asks for.
    pub max_keys: usize,
}

impl Default for StatsLimits {
    fn default() -> Self {
        Self {
            default_keys: 50,
            max_keys: 1_000,
        }
    }
}

#[derive(Clone)]
struct AppState {
    gateway: RenderGateway,
    stats: StatsLimits,
}

/// Build the router serving `gateway`.
pub fn router(gateway: RenderGateway, stats: StatsLimits) -> Router {
    Router::new()
        .route("/render", get(render))
        .route("/cache", delete(purge))
        .route("/prewarm", post(prewarm))
        .route("/stats", get(stats_handler))
        .route("/health", get(health))
        .with_state(AppState { gateway, stats })
}

#[derive(Debug, Deserialize)]
struct KeyQuery {
    url: Option<String>,
}

impl KeyQuery {
    fn key(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    keys: Option<usize>,
}

async fn render(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let validator = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    let max_age = format!(
        "public, max-age={}",
        state.gateway.cache().ttl().as_secs()
    );

    let response = match state.gateway.fetch(query.key(), validator).await? {
        Lookup::NotModified { fingerprint } => (
            StatusCode::NOT_MODIFIED,
            [
                (header::ETAG, fingerprint.to_etag()),
                (header::CACHE_CONTROL, max_age),
                (CACHE_STATUS_HEADER, "HIT".to_string()),
            ],
        )
            .into_response(),
        Lookup::Document(rendered) => {
            let cache_status = match rendered.source {
                Source::Cache => "HIT",
                Source::Render => "MISS",
            };
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, HTML_CONTENT_TYPE.to_string()),
                    (header::ETAG, rendered.fingerprint.to_etag()),
                    (header::CACHE_CONTROL, max_age),
                    (CACHE_STATUS_HEADER, cache_status.to_string()),
                ],
                rendered.artifact,
            )
                .into_response()
        }
    };
    Ok(response)
}

#[derive(Debug, Serialize)]
struct PurgeResponse {
    purged: bool,
}

async fn purge(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<PurgeResponse>, ApiError> {
    validate_key(query.key())?;
    let purged = state.gateway.purge(query.key());
    Ok(Json(PurgeResponse { purged }))
}

#[derive(Debug, Serialize)]
struct PrewarmResponse {
    cached: bool,
}

async fn prewarm(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<(StatusCode, Json<PrewarmResponse>), ApiError> {
    let cached = state.gateway.prewarm_detached(query.key())?;
    let status = if cached {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(PrewarmResponse { cached })))
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: GatewayStats,
    keys: Vec<String>,
}

async fn stats_handler(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Json<StatsResponse> {
    let limit = query
        .keys
        .unwrap_or(state.stats.default_keys)
        .min(state.stats.max_keys);
    Json(StatsResponse {
        stats: state.gateway.stats(),
        keys: state.gateway.keys(limit),
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: PKG_VERSION,
    })
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// [`PrerenderError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(PrerenderError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            PrerenderError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            PrerenderError::RenderTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            PrerenderError::RenderFailure(_) | PrerenderError::Http(_) => StatusCode::BAD_GATEWAY,
            PrerenderError::Api { status, .. } => {
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            PrerenderError::JobAborted => StatusCode::SERVICE_UNAVAILABLE,
            PrerenderError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PrerenderError> for ApiError {
    fn from(err: PrerenderError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
