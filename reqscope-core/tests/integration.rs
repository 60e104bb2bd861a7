//! Integration tests for the capture pipeline and the analytics API
//!
//! Requests are driven through the assembled router with `oneshot`; captured
//! events go through the real recorder into an in-memory database.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use reqscope_core::capture::{Recorder, RecorderHandle};
use reqscope_core::server::build_app;
use reqscope_core::{CaptureEvent, Config, EventFilter, EventStore};
use serde_json::Value;
use tower::ServiceExt;

/// Router with capture enabled, plus the handle to flush the recorder
fn capturing_app(store: &EventStore) -> (Router, RecorderHandle) {
    reqscope_core::logging::init_test();
    let (recorder, handle) = Recorder::spawn(store.clone());
    (build_app(store.clone(), Some(recorder), &Config::default()), handle)
}

/// Router without capture, for reading analytics over seeded data
fn reporting_app(store: &EventStore) -> Router {
    build_app(store.clone(), None, &Config::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn seed(store: &EventStore, events: Vec<CaptureEvent>) {
    for event in events {
        store.insert(event).await.unwrap();
    }
}

fn at(ts: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(ts)
        .unwrap()
        .with_timezone(&Utc)
}

// ============================================
// Capture
// ============================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_all_recorded() {
    let store = EventStore::in_memory().unwrap();
    let (app, handle) = capturing_app(&store);
    let n = 50;

    let tasks: Vec<_> = (0..n)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let uri = format!("/api/analytics?skip={}", i);
                app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    drop(app);
    let stats = handle.finish().await;
    assert_eq!(stats.recorded, n);
    assert_eq!(stats.failed, 0);

    let events = store.find(EventFilter::default(), 0, 1000).await.unwrap();
    assert_eq!(events.len(), n as usize);
    for event in &events {
        assert_eq!(event.path(), "/api/analytics");
        assert_eq!(
            event.total_bandwidth(),
            event.request_size() + event.response_size()
        );
        assert!(event.response_size() > 0);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_request_burst_loses_no_events() {
    let store = EventStore::in_memory().unwrap();
    let (app, handle) = capturing_app(&store);
    let n: u64 = 5000;

    let tasks: Vec<_> = (0..n)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let uri = format!("/burst/{}", i);
                app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::NOT_FOUND);
    }

    drop(app);
    let stats = handle.finish().await;
    assert_eq!(stats.recorded, n);
    assert_eq!(stats.failed, 0);
    assert_eq!(store.count(EventFilter::default()).await.unwrap(), n);
}

#[tokio::test]
async fn test_excluded_paths_produce_no_events() {
    let store = EventStore::in_memory().unwrap();
    let (app, handle) = capturing_app(&store);

    for uri in ["/health", "/docs", "/docs/index.html", "/favicon.ico", "/static/app.js"] {
        app.clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
    }

    drop(app);
    assert_eq!(handle.finish().await.recorded, 0);
    assert_eq!(store.count(EventFilter::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_response_body_is_unchanged_by_capture() {
    let store = EventStore::in_memory().unwrap();
    seed(
        &store,
        vec![CaptureEvent::new(Utc::now(), "GET", "/seeded", 200, 3, 4)],
    )
    .await;

    let (captured_status, captured) = {
        let (app, handle) = capturing_app(&store);
        let result = get(&app, "/api/analytics/bandwidth?path=seeded").await;
        drop(app);
        handle.finish().await;
        result
    };
    let (plain_status, plain) = get(
        &reporting_app(&store),
        "/api/analytics/bandwidth?path=seeded",
    )
    .await;

    assert_eq!(captured_status, plain_status);
    assert_eq!(captured, plain);
    assert_eq!(store.count(EventFilter::default()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_forwarded_client_ip_is_recorded() {
    let store = EventStore::in_memory().unwrap();
    let (app, handle) = capturing_app(&store);

    let request = Request::get("/api/analytics/summary")
        .header("x-forwarded-for", "198.51.100.4, 10.0.0.2")
        .header("user-agent", "curl/8.0")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    drop(app);
    handle.finish().await;

    let (_, body) = get(&reporting_app(&store), "/api/analytics/ip-stats").await;
    assert_eq!(body["data"]["total_unique_ips"], 1);
    assert_eq!(body["data"]["ip_statistics"][0]["client_ip"], "198.51.100.4");
    assert_eq!(
        body["data"]["raw_data"][0]["path"],
        "/api/analytics/summary"
    );
}

// ============================================
// Listing
// ============================================

#[tokio::test]
async fn test_list_paginates_newest_first() {
    let store = EventStore::in_memory().unwrap();
    let base = Utc::now() - Duration::hours(1);
    seed(
        &store,
        (0..5)
            .map(|i| {
                CaptureEvent::new(
                    base + Duration::minutes(i),
                    "GET",
                    format!("/items/{}", i),
                    200,
                    0,
                    10,
                )
            })
            .collect(),
    )
    .await;
    let app = reporting_app(&store);

    let (status, body) = get(&app, "/api/analytics?skip=1&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Analytics records retrieved successfully");
    assert_eq!(body["total"], 5);
    assert_eq!(body["skip"], 1);
    assert_eq!(body["limit"], 2);

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["path"], "/items/3");
    assert_eq!(data[1]["path"], "/items/2");

    // Trailing slash variant
    let (status, body) = get(&app, "/api/analytics/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_list_filters() {
    let store = EventStore::in_memory().unwrap();
    let now = Utc::now();
    seed(
        &store,
        vec![
            CaptureEvent::new(now, "GET", "/API/users", 200, 0, 1),
            CaptureEvent::new(now, "POST", "/api/users", 201, 5, 1),
            CaptureEvent::new(now, "GET", "/other", 404, 0, 1),
        ],
    )
    .await;
    let app = reporting_app(&store);

    let (_, body) = get(&app, "/api/analytics?path=api").await;
    assert_eq!(body["total"], 2);

    let (_, body) = get(&app, "/api/analytics?method=post").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["status_code"], 201);

    let (_, body) = get(&app, "/api/analytics?status_code=404&method=&path=").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["path"], "/other");
}

#[tokio::test]
async fn test_bad_parameters_get_error_envelope() {
    let store = EventStore::in_memory().unwrap();
    let app = reporting_app(&store);

    for uri in [
        "/api/analytics?limit=0",
        "/api/analytics?limit=1001",
        "/api/analytics?limit=abc",
        "/api/analytics?skip=-3",
        "/api/analytics?start_date=not-a-date",
        "/api/analytics/summary?days=0",
        "/api/analytics/bandwidth?end_date=2024-13-45",
        "/api/analytics/ip-stats?days=soon",
    ] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "BAD_REQUEST", "{}", uri);
        assert!(body["message"].is_string(), "{}", uri);
    }

    let (_, body) = get(&app, "/api/analytics/summary?start_date=yesterday").await;
    assert_eq!(
        body["message"],
        "Invalid start_date format. Use YYYY-MM-DD or ISO format"
    );
}

// ============================================
// Reports
// ============================================

#[tokio::test]
async fn test_summary_report() {
    let store = EventStore::in_memory().unwrap();
    let now = Utc::now();
    seed(
        &store,
        vec![
            CaptureEvent::new(now, "GET", "/a", 200, 100, 900)
                .with_response_time_ms(Some(10.0)),
            CaptureEvent::new(now, "GET", "/a", 500, 0, 24)
                .with_response_time_ms(Some(30.0)),
            CaptureEvent::new(now, "POST", "/b", 201, 50, 50),
        ],
    )
    .await;
    let app = reporting_app(&store);

    let (status, body) = get(&app, "/api/analytics/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Analytics summary retrieved successfully");

    let data = &body["data"];
    assert_eq!(data["total_requests"], 3);
    assert_eq!(data["total_bandwidth"], 1124);
    assert_eq!(data["average_response_time_ms"], 20.0);
    assert_eq!(data["requests_by_method"]["GET"], 2);
    assert_eq!(data["requests_by_method"]["POST"], 1);
    assert_eq!(data["requests_by_status"]["500"], 1);
    assert_eq!(data["requests_by_endpoint"]["/a"], 2);
}

#[tokio::test]
async fn test_empty_summary() {
    let store = EventStore::in_memory().unwrap();
    let (_, body) = get(&reporting_app(&store), "/api/analytics/summary?days=7").await;

    let data = &body["data"];
    assert_eq!(data["total_requests"], 0);
    assert_eq!(data["total_bandwidth"], 0);
    assert!(data["requests_by_method"].as_object().unwrap().is_empty());
    assert!(data["requests_by_endpoint"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_days_overrides_explicit_dates() {
    let store = EventStore::in_memory().unwrap();
    seed(
        &store,
        vec![
            CaptureEvent::new(Utc::now() - Duration::days(2), "GET", "/recent", 200, 0, 0),
            CaptureEvent::new(at("2020-06-01T12:00:00Z"), "GET", "/old", 200, 0, 0),
        ],
    )
    .await;
    let app = reporting_app(&store);

    let (_, body) = get(
        &app,
        "/api/analytics/summary?start_date=2020-06-01&end_date=2020-06-01&days=7",
    )
    .await;
    assert_eq!(body["data"]["total_requests"], 1);
    assert_eq!(body["data"]["requests_by_endpoint"]["/recent"], 1);

    let (_, body) = get(
        &app,
        "/api/analytics/summary?start_date=2020-06-01&end_date=2020-06-01",
    )
    .await;
    assert_eq!(body["data"]["requests_by_endpoint"]["/old"], 1);
}

#[tokio::test]
async fn test_bare_end_date_covers_whole_day() {
    let store = EventStore::in_memory().unwrap();
    seed(
        &store,
        vec![
            CaptureEvent::new(at("2024-01-15T23:59:58Z"), "GET", "/late", 200, 0, 0),
            CaptureEvent::new(at("2024-01-16T00:00:01Z"), "GET", "/next", 200, 0, 0),
        ],
    )
    .await;
    let app = reporting_app(&store);

    let (_, bare) = get(&app, "/api/analytics/summary?end_date=2024-01-15").await;
    let (_, explicit) = get(
        &app,
        "/api/analytics/summary?end_date=2024-01-15T23:59:59",
    )
    .await;

    assert_eq!(bare, explicit);
    assert_eq!(bare["data"]["total_requests"], 1);
}

#[tokio::test]
async fn test_bandwidth_report_formats_sizes() {
    let store = EventStore::in_memory().unwrap();
    let now = Utc::now();
    seed(
        &store,
        vec![
            CaptureEvent::new(now, "GET", "/file", 200, 1024, 0),
            CaptureEvent::new(now, "GET", "/file", 200, 0, 1024),
        ],
    )
    .await;

    let (status, body) = get(&reporting_app(&store), "/api/analytics/bandwidth").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Bandwidth statistics retrieved successfully");

    let data = &body["data"];
    assert_eq!(data["total_request_size"], 1024);
    assert_eq!(data["total_response_size"], 1024);
    assert_eq!(data["total_bandwidth"], 2048);
    assert_eq!(data["total_bandwidth_formatted"], "2.00 KB");
    assert_eq!(data["avg_request_size_formatted"], "512.00 B");
    assert_eq!(data["max_response_size_formatted"], "1.00 KB");
}

#[tokio::test]
async fn test_ip_stats_groups_by_day_and_path() {
    let store = EventStore::in_memory().unwrap();
    let ip = |event: CaptureEvent, ip: &str| event.with_client_ip(Some(ip.to_string()));
    seed(
        &store,
        vec![
            ip(CaptureEvent::new(at("2024-03-01T09:00:00Z"), "GET", "/a", 200, 0, 0), "10.0.0.1"),
            ip(CaptureEvent::new(at("2024-03-01T10:00:00Z"), "GET", "/a", 200, 0, 0), "10.0.0.1"),
            ip(CaptureEvent::new(at("2024-03-01T11:00:00Z"), "GET", "/b", 200, 0, 0), "10.0.0.1"),
            ip(CaptureEvent::new(at("2024-03-02T11:00:00Z"), "GET", "/a", 200, 0, 0), "10.0.0.2"),
            CaptureEvent::new(at("2024-03-02T12:00:00Z"), "GET", "/anon", 200, 0, 0),
        ],
    )
    .await;

    let (status, body) = get(
        &reporting_app(&store),
        "/api/analytics/ip-stats?start_date=2024-03-01&end_date=2024-03-02",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "IP request statistics retrieved successfully");

    let data = &body["data"];
    assert_eq!(data["total_unique_ips"], 2);
    assert_eq!(data["raw_data"].as_array().unwrap().len(), 3);

    let first = &data["ip_statistics"][0];
    assert_eq!(first["client_ip"], "10.0.0.1");
    assert_eq!(first["total_requests"], 3);

    let rows = first["by_day_and_path"].as_array().unwrap();
    let a = rows.iter().find(|r| r["path"] == "/a").unwrap();
    assert_eq!(a["date"], "2024-03-01");
    assert_eq!(a["request_count"], 2);
}

// ============================================
// Cleanup
// ============================================

#[tokio::test]
async fn test_cleanup_endpoint() {
    let store = EventStore::in_memory().unwrap();
    let now = Utc::now();
    seed(
        &store,
        vec![
            CaptureEvent::new(now - Duration::days(91), "GET", "/old", 200, 0, 0),
            CaptureEvent::new(now - Duration::days(89), "GET", "/new", 200, 0, 0),
            CaptureEvent::new(now - Duration::days(10), "GET", "/newer", 200, 0, 0),
        ],
    )
    .await;
    let app = reporting_app(&store);

    let delete = |uri: &str| Request::delete(uri).body(Body::empty()).unwrap();

    let (status, body) = send(&app, delete("/api/analytics/cleanup")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Deleted 1 old analytics records");
    assert_eq!(body["deleted_count"], 1);

    let (_, body) = send(&app, delete("/api/analytics/cleanup?days=30")).await;
    assert_eq!(body["deleted_count"], 1);

    let (status, body) = send(&app, delete("/api/analytics/cleanup?days=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BAD_REQUEST");

    assert_eq!(store.count(EventFilter::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_health_endpoint() {
    let store = EventStore::in_memory().unwrap();
    let (status, body) = get(&reporting_app(&store), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
