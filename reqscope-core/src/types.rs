//! Core domain types for reqscope
//!
//! A [`CaptureEvent`] is one immutable record of a single HTTP request/response
//! exchange. Events are produced by the capture middleware, persisted once by the
//! event store, and only ever read afterwards.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Largest size recorded for a single body.
///
/// Client-supplied `content-length` values are clamped here so the request and
/// response sizes, and their sum, always fit SQLite's signed 64-bit integers.
pub const MAX_RECORDED_BYTES: u64 = (i64::MAX / 2) as u64;

/// One recorded HTTP exchange.
///
/// Fields are private so that `total_bandwidth` can only ever be the sum of the
/// request and response sizes. Use the builder-style `with_*` methods to attach
/// optional metadata before handing the event to the recorder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureEvent {
    id: Option<String>,
    timestamp: DateTime<Utc>,
    method: String,
    path: String,
    status_code: u16,
    request_size: u64,
    response_size: u64,
    total_bandwidth: u64,
    client_ip: Option<String>,
    user_agent: Option<String>,
    response_time_ms: Option<f64>,
}

impl CaptureEvent {
    /// Create an event without an id; the store assigns one on insert.
    pub fn new(
        timestamp: DateTime<Utc>,
        method: impl Into<String>,
        path: impl Into<String>,
        status_code: u16,
        request_size: u64,
        response_size: u64,
    ) -> Self {
        let request_size = request_size.min(MAX_RECORDED_BYTES);
        let response_size = response_size.min(MAX_RECORDED_BYTES);
        Self {
            id: None,
            timestamp,
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            status_code,
            request_size,
            response_size,
            total_bandwidth: request_size + response_size,
            client_ip: None,
            user_agent: None,
            response_time_ms: None,
        }
    }

    pub fn with_client_ip(mut self, client_ip: Option<String>) -> Self {
        self.client_ip = client_ip;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Set the response time from a measured duration, rounded to 2 decimals.
    pub fn with_response_time(self, elapsed: Duration) -> Self {
        self.with_response_time_ms(Some(round_millis(elapsed)))
    }

    pub fn with_response_time_ms(mut self, response_time_ms: Option<f64>) -> Self {
        self.response_time_ms = response_time_ms.map(|ms| ms.max(0.0));
        self
    }

    pub(crate) fn with_id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn request_size(&self) -> u64 {
        self.request_size
    }

    pub fn response_size(&self) -> u64 {
        self.response_size
    }

    /// Always `request_size + response_size`.
    pub fn total_bandwidth(&self) -> u64 {
        self.total_bandwidth
    }

    pub fn client_ip(&self) -> Option<&str> {
        self.client_ip.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn response_time_ms(&self) -> Option<f64> {
        self.response_time_ms
    }
}

/// Convert a duration to milliseconds rounded to 2 decimal places.
pub fn round_millis(elapsed: Duration) -> f64 {
    (elapsed.as_micros() as f64 / 10.0).round() / 100.0
}
