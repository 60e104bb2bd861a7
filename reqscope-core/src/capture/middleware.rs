//! Request capture middleware
//!
//! Wraps every HTTP exchange, measures request/response sizes and handler
//! latency, and emits exactly one [`CaptureEvent`] per non-excluded request.
//!
//! Sizes come from `content-length` when it parses. Otherwise the body is
//! buffered, measured, and replayed: the request or response is rebuilt from its
//! original parts around the buffered bytes, so downstream consumers and the
//! client see the same status, headers and content. Request buffering is capped
//! by `capture.max_body_bytes`; responses are never capped or replaced.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use super::recorder::Recorder;
use crate::config::CaptureConfig;
use crate::types::CaptureEvent;

/// State shared by every invocation of [`capture_middleware`]
#[derive(Clone)]
pub struct CaptureState {
    recorder: Recorder,
    exclude_paths: Arc<[String]>,
    max_body_bytes: usize,
}

impl CaptureState {
    pub fn new(recorder: Recorder, config: &CaptureConfig) -> Self {
        Self {
            recorder,
            exclude_paths: config.exclude_paths.clone().into(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Case-sensitive prefix match against the configured exclusions
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// axum middleware recording one capture event per exchange.
///
/// Install with `axum::middleware::from_fn_with_state(state, capture_middleware)`.
pub async fn capture_middleware(
    State(state): State<CaptureState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if state.is_excluded(&path) {
        return next.run(request).await;
    }

    let timestamp = Utc::now();
    let method = request.method().as_str().to_string();
    let client_ip = resolve_client_ip(&request);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    let (request, request_size) = match measure_request(request, state.max_body_bytes).await {
        Ok(measured) => measured,
        Err(e) => {
            tracing::warn!(method = %method, path = %path, error = %e, "Failed to read request body");
            let (response, response_size) =
                body_error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
            let event = CaptureEvent::new(
                timestamp,
                method,
                path,
                response.status().as_u16(),
                0,
                response_size,
            )
            .with_client_ip(client_ip)
            .with_user_agent(user_agent);
            state.recorder.record(event);
            return response;
        }
    };

    let started = Instant::now();
    let response = next.run(request).await;
    let elapsed = started.elapsed();

    let (response, response_size) = measure_response(response).await;

    let event = CaptureEvent::new(
        timestamp,
        method,
        path,
        response.status().as_u16(),
        request_size,
        response_size,
    )
    .with_client_ip(client_ip)
    .with_user_agent(user_agent)
    .with_response_time(elapsed);

    // Fire and forget: the response goes out whether or not this is stored
    state.recorder.record(event);

    response
}

/// First `x-forwarded-for` hop, else the peer address, else nothing
fn resolve_client_ip(request: &Request) -> Option<String> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// `content-length` as a byte count; missing or unparsable yields `None`
fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

async fn measure_request(request: Request, limit: usize) -> Result<(Request, u64), axum::Error> {
    if let Some(len) = content_length(request.headers()) {
        return Ok((request, len));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, limit).await?;
    let size = bytes.len() as u64;
    Ok((Request::from_parts(parts, Body::from(bytes)), size))
}

/// Response size, draining the body only when `content-length` can't be used.
///
/// Never replaces the handler's response. If the body fails mid-stream, the
/// status and headers still go out and the size counts as zero.
async fn measure_response(response: Response) -> (Response, u64) {
    if let Some(len) = content_length(response.headers()) {
        return (response, len);
    }

    let (parts, body) = response.into_parts();
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            let size = bytes.len() as u64;
            (Response::from_parts(parts, Body::from(bytes)), size)
        }
        Err(e) => {
            tracing::warn!(status = %parts.status, error = %e, "Response body failed while measuring");
            (Response::from_parts(parts, Body::empty()), 0)
        }
    }
}

/// JSON error response produced by the interceptor itself, with its byte size
fn body_error_response(status: StatusCode, message: &str) -> (Response, u64) {
    let body = crate::api::error_envelope(status, message).to_string();
    let size = body.len() as u64;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    (response, size)
}
