//! Async event store
//!
//! [`EventStore`] is the handle the HTTP layer and the background recorder share.
//! It owns the [`Database`] behind an `Arc` and runs every call on tokio's
//! blocking pool, so the connection mutex is never held across an `.await`.

use crate::analytics::{BandwidthStats, EventFilter, IpDayPathCount, TrafficSummary};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::CaptureEvent;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Cloneable async handle over the capture event database
#[derive(Clone)]
pub struct EventStore {
    db: Arc<Database>,
}

impl EventStore {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Open a migrated in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        db.migrate()?;
        Ok(Self::new(db))
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
    }

    /// Persist an event and return it with its assigned id
    pub async fn insert(&self, event: CaptureEvent) -> Result<CaptureEvent> {
        self.run(move |db| db.insert_event(&event)).await
    }

    /// Remove events with a timestamp before `cutoff`
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.run(move |db| db.delete_events_before(cutoff)).await
    }

    /// Retention job: remove events older than `days` days
    pub async fn cleanup(&self, days: u32) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let deleted = self.delete_older_than(cutoff).await?;
        tracing::info!(days, deleted, cutoff = %cutoff, "Retention cleanup finished");
        Ok(deleted)
    }

    /// Drop every stored event
    pub async fn delete_all(&self) -> Result<usize> {
        let deleted = self.run(|db| db.delete_all_events()).await?;
        tracing::warn!(deleted, "All capture events deleted");
        Ok(deleted)
    }

    pub async fn find(
        &self,
        filter: EventFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<CaptureEvent>> {
        self.run(move |db| db.find_events(&filter, skip, limit))
            .await
    }

    pub async fn count(&self, filter: EventFilter) -> Result<u64> {
        self.run(move |db| db.count_events(&filter)).await
    }

    pub async fn summary(&self, filter: EventFilter) -> Result<TrafficSummary> {
        self.run(move |db| db.traffic_summary(&filter)).await
    }

    pub async fn bandwidth(&self, filter: EventFilter) -> Result<BandwidthStats> {
        self.run(move |db| db.bandwidth_stats(&filter)).await
    }

    pub async fn ip_day_path_counts(&self, filter: EventFilter) -> Result<Vec<IpDayPathCount>> {
        self.run(move |db| db.ip_day_path_counts(&filter)).await
    }
}
