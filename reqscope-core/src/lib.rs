//! # reqscope-core
//!
//! Core library for reqscope - HTTP request capture and traffic analytics.
//!
//! This library provides:
//! - An axum middleware that measures every exchange (sizes, latency, client)
//! - A background recorder that persists capture events without delaying responses
//! - SQLite storage with retention cleanup
//! - Reports: traffic summary, bandwidth statistics, per-client IP activity
//! - The `/api/analytics` JSON API, configuration and logging
//!
//! ## Architecture
//!
//! Data flows in one direction:
//! - **Capture:** [`capture::capture_middleware`] builds a [`CaptureEvent`] per request
//! - **Record:** [`capture::Recorder`] queues it; one worker writes it through [`EventStore`]
//! - **Report:** [`api`] handlers query the store and shape the results
//!
//! ## Example
//!
//! ```rust,no_run
//! use reqscope_core::{Config, Database, EventStore};
//!
//! # async fn run() -> reqscope_core::Result<()> {
//! let config = Config::load()?;
//!
//! let db = Database::open(&config.resolved_database_path())?;
//! db.migrate()?;
//!
//! let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
//! reqscope_core::server::serve(listener, EventStore::new(db), &config).await?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{BandwidthStats, EventFilter, IpStatsReport, TrafficSummary};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use store::EventStore;
pub use types::*;

// Public modules
pub mod analytics;
pub mod api;
pub mod capture;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod server;
pub mod store;
pub mod types;
