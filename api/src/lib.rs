//! HTTP surface for Sandlot.
//!
//! | Method & path | Operation |
//! |---|---|
//! | `GET /healthz` | liveness |
//! | `GET /v1/workloads/:id/status` | reconcile and report status |
//! | `POST /v1/workloads/:id/verify` | start a verification pipeline |
//! | `POST /v1/workloads/:id/runtime` | launch a runtime instance |
//! | `GET /v1/workloads/:id/runtime/status?taskHandle=` | runtime state and endpoint |
//! | `POST /v1/workloads/:id/runtime/stop` | stop a runtime instance |
//!
//! Ids containing `/` must be percent-encoded. Failures use the envelope
//! `{requestId, error: {code, message}}`.

mod error;

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sandlot_engine::LifecycleService;
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub use error::{ApiError, ErrorCode};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn build_router(service: Arc<LifecycleService>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/workloads/:id/status", get(get_status))
        .route("/v1/workloads/:id/verify", post(start_verification))
        .route("/v1/workloads/:id/runtime", post(launch_runtime))
        .route("/v1/workloads/:id/runtime/status", get(get_runtime_status))
        .route("/v1/workloads/:id/runtime/stop", post(stop_runtime))
        .layer(from_fn(request_log_middleware))
        .with_state(service)
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

async fn request_log_middleware(mut request: Request, next: Next) -> Response {
    let rid = request_id(request.headers());
    if let Ok(value) = HeaderValue::from_str(&rid) {
        request.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        request_id = %rid,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "HTTP request"
    );
    response
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskHandleParams {
    task_handle: Option<String>,
}

/// Decode an optional JSON body. An empty body is the default value.
fn parse_body<T: DeserializeOwned + Default>(rid: &str, body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(rid, format!("invalid request body: {e}")))
}

fn require_task_handle(rid: &str, params: TaskHandleParams) -> Result<String, ApiError> {
    params
        .task_handle
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(rid, "taskHandle is required"))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn get_status(
    State(service): State<Arc<LifecycleService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let rid = request_id(&headers);
    let result = service
        .get_status(&id)
        .await
        .map_err(|e| ApiError::from_lifecycle(&rid, &e))?;
    Ok(Json(result).into_response())
}

async fn start_verification(
    State(service): State<Arc<LifecycleService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let rid = request_id(&headers);
    let body: VerifyBody = parse_body(&rid, &body)?;
    let outcome = service
        .start_verification(&id, body.name.as_deref())
        .await
        .map_err(|e| ApiError::from_lifecycle(&rid, &e))?;
    Ok(Json(outcome).into_response())
}

async fn launch_runtime(
    State(service): State<Arc<LifecycleService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let rid = request_id(&headers);
    let outcome = service
        .launch_runtime(&id)
        .await
        .map_err(|e| ApiError::from_lifecycle(&rid, &e))?;
    Ok(Json(outcome).into_response())
}

async fn get_runtime_status(
    State(service): State<Arc<LifecycleService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<TaskHandleParams>,
) -> Result<Response, ApiError> {
    let rid = request_id(&headers);
    let handle = require_task_handle(&rid, params)?;
    let status = service
        .get_runtime_status(&id, &handle)
        .await
        .map_err(|e| ApiError::from_lifecycle(&rid, &e))?;
    Ok(Json(status).into_response())
}

async fn stop_runtime(
    State(service): State<Arc<LifecycleService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let rid = request_id(&headers);
    let params: TaskHandleParams = parse_body(&rid, &body)?;
    let handle = require_task_handle(&rid, params)?;
    let outcome = service
        .stop_runtime(&id, &handle)
        .await
        .map_err(|e| ApiError::from_lifecycle(&rid, &e))?;
    Ok(Json(outcome).into_response())
}
