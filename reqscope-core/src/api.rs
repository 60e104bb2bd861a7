//! Analytics HTTP API
//!
//! JSON endpoints under `/api/analytics` serving the stored capture events and
//! the reports computed from them. Every failure uses the same envelope:
//!
//! ```json
//! {"message": "Invalid start_date format. Use YYYY-MM-DD or ISO format", "error": "BAD_REQUEST"}
//! ```

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::analytics::filter::non_empty;
use crate::analytics::{parse_date_range, report_filter, EventFilter, IpStatsReport};
use crate::error::Error;
use crate::store::EventStore;

/// Default page size for event listings
pub const DEFAULT_LIMIT: u64 = 100;
/// Largest page a caller may request
pub const MAX_LIMIT: u64 = 1000;

const BAD_REQUEST: &str = "BAD_REQUEST";
const STORAGE_UNAVAILABLE: &str = "STORAGE_UNAVAILABLE";

/// Shared state for the analytics handlers
#[derive(Clone)]
pub struct ApiState {
    pub store: EventStore,
    /// Default lookback for `DELETE /cleanup` when `days` is not given
    pub retention_days: u32,
}

/// Build the `/api/analytics` router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/analytics", get(list_events))
        .route("/api/analytics/", get(list_events))
        .route("/api/analytics/summary", get(summary))
        .route("/api/analytics/bandwidth", get(bandwidth))
        .route("/api/analytics/ip-stats", get(ip_stats))
        .route("/api/analytics/cleanup", delete(cleanup))
        .with_state(state)
}

// ============ Errors ============

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiError {
    message: String,
    error: &'static str,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: BAD_REQUEST,
        }
    }

    fn status(&self) -> StatusCode {
        if self.error == BAD_REQUEST {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_bad_request() {
            return Self::bad_request(err.to_string());
        }

        tracing::error!(error = %err, "Analytics request failed");
        Self {
            message: "Analytics storage is unavailable".to_string(),
            error: STORAGE_UNAVAILABLE,
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Error envelope for a status, shared with the capture middleware
pub fn error_envelope(status: StatusCode, message: &str) -> Value {
    let code = if status.is_client_error() {
        BAD_REQUEST
    } else {
        STORAGE_UNAVAILABLE
    };
    json!({ "message": message, "error": code })
}

// ============ Query Types ============

/// Parameters of `GET /api/analytics`.
///
/// Kept as strings so empty values read as absent and bad numbers get the
/// standard error envelope.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    skip: Option<String>,
    limit: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    method: Option<String>,
    path: Option<String>,
    status_code: Option<String>,
}

/// Parameters shared by the report endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    start_date: Option<String>,
    end_date: Option<String>,
    days: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupParams {
    days: Option<String>,
}

fn parse_number<T: std::str::FromStr>(param: &str, value: Option<&str>) -> Result<Option<T>, Error> {
    non_empty(value)
        .map(|v| {
            v.parse::<T>().map_err(|_| {
                Error::InvalidFilter(format!("Invalid {} value: expected an integer", param))
            })
        })
        .transpose()
}

impl ListParams {
    fn page(&self) -> Result<(u64, u64), Error> {
        let skip = parse_number::<i64>("skip", self.skip.as_deref())?.unwrap_or(0);
        if skip < 0 {
            return Err(Error::InvalidFilter("skip must be at least 0".to_string()));
        }

        let limit = parse_number::<i64>("limit", self.limit.as_deref())?
            .unwrap_or(DEFAULT_LIMIT as i64);
        if limit < 1 || limit > MAX_LIMIT as i64 {
            return Err(Error::InvalidFilter(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        Ok((skip as u64, limit as u64))
    }

    fn filter(&self) -> Result<EventFilter, Error> {
        let (start, end) =
            parse_date_range(self.start_date.as_deref(), self.end_date.as_deref())?;
        let status_code = parse_number::<u16>("status_code", self.status_code.as_deref())?;

        Ok(EventFilter {
            start,
            end,
            method: non_empty(self.method.as_deref()).map(str::to_uppercase),
            status_code,
            ..Default::default()
        }
        .with_path(self.path.as_deref()))
    }
}

impl ReportParams {
    fn filter(&self) -> Result<EventFilter, Error> {
        let days = parse_number::<i64>("days", self.days.as_deref())?;
        report_filter(
            self.start_date.as_deref(),
            self.end_date.as_deref(),
            days,
            self.path.as_deref(),
            Utc::now(),
        )
    }
}

// ============ Handlers ============

async fn list_events(
    State(state): State<ApiState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = params?;
    let (skip, limit) = params.page()?;
    let filter = params.filter()?;

    let total = state.store.count(filter.clone()).await?;
    let data = state.store.find(filter, skip, limit).await?;

    Ok(Json(json!({
        "message": "Analytics records retrieved successfully",
        "data": data,
        "total": total,
        "skip": skip,
        "limit": limit,
    })))
}

async fn summary(
    State(state): State<ApiState>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = params?;
    let summary = state.store.summary(params.filter()?).await?;

    Ok(Json(json!({
        "message": "Analytics summary retrieved successfully",
        "data": summary,
    })))
}

async fn bandwidth(
    State(state): State<ApiState>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = params?;
    let stats = state.store.bandwidth(params.filter()?).await?;

    Ok(Json(json!({
        "message": "Bandwidth statistics retrieved successfully",
        "data": stats.formatted(),
    })))
}

async fn ip_stats(
    State(state): State<ApiState>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = params?;
    let rows = state.store.ip_day_path_counts(params.filter()?).await?;

    Ok(Json(json!({
        "message": "IP request statistics retrieved successfully",
        "data": IpStatsReport::from_rows(rows),
    })))
}

async fn cleanup(
    State(state): State<ApiState>,
    params: Result<Query<CleanupParams>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = params?;
    let days = parse_number::<i64>("days", params.days.as_deref())?
        .unwrap_or(i64::from(state.retention_days));
    if days < 1 {
        return Err(ApiError::bad_request("days must be at least 1"));
    }
    let days = u32::try_from(days)
        .map_err(|_| ApiError::bad_request(format!("days must be at most {}", u32::MAX)))?;

    let deleted = state.store.cleanup(days).await?;

    Ok(Json(json!({
        "message": format!("Deleted {} old analytics records", deleted),
        "deleted_count": deleted,
    })))
}
