//! HTTP server assembly
//!
//! [`build_app`] wires the analytics API, the health check and the capture
//! middleware into one router. [`serve`] runs it until ctrl-c or SIGTERM, then
//! flushes the background recorder.

use std::net::SocketAddr;

use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{self, ApiState};
use crate::capture::{capture_middleware, CaptureState, Recorder, RecorderStats};
use crate::config::Config;
use crate::error::Result;
use crate::store::EventStore;

/// Build the application router.
///
/// With a `recorder`, every route (fallback included) sits behind the capture
/// middleware; without one, nothing is captured.
pub fn build_app(store: EventStore, recorder: Option<Recorder>, config: &Config) -> Router {
    let api = api::router(ApiState {
        store,
        retention_days: config.retention.days,
    });

    let app = Router::new()
        .route("/health", get(health))
        .merge(api)
        .fallback(not_found);

    let app = match recorder {
        Some(recorder) => app.layer(axum::middleware::from_fn_with_state(
            CaptureState::new(recorder, &config.capture),
            capture_middleware,
        )),
        None => app,
    };

    app.layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("No route for {}", uri.path()) })),
    )
}

/// Serve on `listener` until a shutdown signal arrives.
///
/// Returns the recorder's counters once every queued event has been written.
pub async fn serve(listener: TcpListener, store: EventStore, config: &Config) -> Result<RecorderStats> {
    let (recorder, recorder_handle) = if config.capture.enabled {
        let (recorder, handle) = Recorder::spawn(store.clone());
        (Some(recorder), Some(handle))
    } else {
        info!("Request capture disabled");
        (None, None)
    };

    let app = build_app(store, recorder, config);

    let addr = listener.local_addr()?;
    info!(addr = %addr, "Listening on http://{}", addr);

    // Consumes the router, so the last queue sender is gone when this returns
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let stats = match recorder_handle {
        Some(handle) => handle.finish().await,
        None => RecorderStats::default(),
    };

    info!("Server shutdown complete");
    Ok(stats)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
