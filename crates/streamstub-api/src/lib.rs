//! HTTP API: three OpenAI-shaped paths that all stream the same synthetic
//! newline-delimited JSON.

pub mod params;
pub mod record;
pub mod stream;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use streamstub_obs::StreamMetrics;
use tokio_stream::StreamExt as _;

use crate::params::StreamParams;

/// Paths bound to the stream handler. Which one was hit never changes the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    ChatCompletions,
    Completions,
    Models,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::ChatCompletions, Endpoint::Completions, Endpoint::Models];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::ChatCompletions => "/v1/chat/completions",
            Endpoint::Completions => "/v1/completions",
            Endpoint::Models => "/v1/models",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    metrics: StreamMetrics,
}

/// Builds the route table once; the returned router is never mutated again.
pub fn app() -> Router {
    let state = AppState { metrics: StreamMetrics::new() };

    let mut router: Router<AppState> = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics))
        .route("/openapi.json", get(openapi));
    for endpoint in Endpoint::ALL {
        router = router.route(endpoint.path(), get(stream_completion).post(stream_completion));
    }
    router.with_state(state)
}

async fn stream_completion(
    State(state): State<AppState>,
    uri: Uri,
    query: Option<Query<Vec<(String, String)>>>,
    body: Body,
) -> impl IntoResponse {
    drain(body).await;
    let params = match query {
        Some(Query(pairs)) => StreamParams::parse(&pairs),
        None => StreamParams::default(),
    };
    state.metrics.request(uri.path());
    tracing::debug!(
        target: "api",
        route = uri.path(),
        chunks = params.chunks,
        bytes = params.bytes_per_chunk,
        delay_ms = params.delay_ms,
        "stream request"
    );

    let body = stream::spawn_stream(params, state.metrics.clone());
    ([(header::CONTENT_TYPE, "application/json")], body)
}

/// Reads the request body to the end and throws it away.
async fn drain(body: Body) {
    let mut data = body.into_data_stream();
    while let Some(frame) = data.next().await {
        if let Err(e) = frame {
            tracing::debug!(target: "api", "request body read failed: {}", e);
            break;
        }
    }
}

async fn metrics() -> Response {
    match streamstub_obs::render() {
        Ok(buffer) => ([(header::CONTENT_TYPE, streamstub_obs::content_type())], buffer).into_response(),
        Err(e) => {
            tracing::warn!(target: "api", "metrics encoding failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn openapi() -> impl IntoResponse {
    let stream_op = serde_json::json!({
        "summary": "Synthetic newline-delimited JSON stream",
        "parameters": [
            {"name": "chunks", "in": "query", "schema": {"type": "integer", "default": params::DEFAULT_CHUNKS}},
            {"name": "bytes", "in": "query", "schema": {"type": "integer", "default": params::DEFAULT_BYTES_PER_CHUNK}},
            {"name": "delay_ms", "in": "query", "schema": {"type": "integer", "default": 0}}
        ]
    });
    let mut paths = serde_json::Map::new();
    for endpoint in Endpoint::ALL {
        paths.insert(
            endpoint.path().to_string(),
            serde_json::json!({"get": stream_op.clone(), "post": stream_op.clone()}),
        );
    }
    paths.insert("/metrics".into(), serde_json::json!({"get": {"summary": "Prometheus metrics"}}));
    paths.insert("/healthz".into(), serde_json::json!({"get": {"summary": "health"}}));

    Json(serde_json::json!({
        "openapi": "3.0.0",
        "info": {"title": "streamstub", "version": env!("CARGO_PKG_VERSION")},
        "paths": paths,
    }))
}
