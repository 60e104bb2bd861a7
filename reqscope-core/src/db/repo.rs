//! Database repository layer
//!
//! Provides insert, retention, query and aggregation operations over the
//! capture event log. All methods are synchronous; async callers go through
//! [`crate::store::EventStore`].

use crate::analytics::{
    BandwidthStats, EventFilter, IpDayPathCount, SummaryAccumulator, TrafficSummary,
};
use crate::error::Result;
use crate::types::CaptureEvent;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row, ToSql};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const EVENT_COLUMNS: &str = "id, ts, method, path, status_code, request_size, response_size, \
                             client_ip, user_agent, response_time_ms";

/// Database handle (single connection behind a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets report queries read while the recorder writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        super::schema::run_migrations(&conn)
    }

    /// A panic while holding the lock leaves the connection itself usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ============================================
    // Event store operations
    // ============================================

    /// Persist an event, returning it with its newly assigned id
    pub fn insert_event(&self, event: &CaptureEvent) -> Result<CaptureEvent> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn();
        conn.execute(
            r#"
            INSERT INTO capture_events (id, ts, method, path, status_code, request_size,
                                        response_size, total_bandwidth, client_ip, user_agent,
                                        response_time_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                id,
                encode_ts(&event.timestamp()),
                event.method(),
                event.path(),
                event.status_code(),
                to_sql_int(event.request_size()),
                to_sql_int(event.response_size()),
                to_sql_int(event.total_bandwidth()),
                event.client_ip(),
                event.user_agent(),
                event.response_time_ms(),
            ],
        )?;
        Ok(event.clone().with_id(id))
    }

    /// Delete all events with a timestamp strictly before `cutoff`
    pub fn delete_events_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn();
        let deleted = conn.execute(
            "DELETE FROM capture_events WHERE ts < ?1",
            [encode_ts(&cutoff)],
        )?;
        Ok(deleted)
    }

    /// Drop every stored event
    pub fn delete_all_events(&self) -> Result<usize> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM capture_events", [])?;
        Ok(deleted)
    }

    // ============================================
    // Query operations
    // ============================================

    /// Events matching `filter`, most recent first
    pub fn find_events(
        &self,
        filter: &EventFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<CaptureEvent>> {
        let (clause, mut params) = filter_clause(filter);
        let sql = format!(
            "SELECT {} FROM capture_events{} ORDER BY ts DESC, rowid DESC LIMIT ? OFFSET ?",
            EVENT_COLUMNS, clause
        );
        params.push(Box::new(to_sql_int(limit)));
        params.push(Box::new(to_sql_int(skip)));

        let conn = self.conn();
        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_refs.as_slice(), Self::row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Number of events matching `filter`, ignoring pagination
    pub fn count_events(&self, filter: &EventFilter) -> Result<u64> {
        let (clause, params) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM capture_events{}", clause);

        let conn = self.conn();
        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let count: i64 = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
        Ok(from_sql_int(count))
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<CaptureEvent> {
        let ts: String = row.get("ts")?;
        let timestamp = decode_ts(&ts).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
        })?;

        let event = CaptureEvent::new(
            timestamp,
            row.get::<_, String>("method")?,
            row.get::<_, String>("path")?,
            row.get("status_code")?,
            from_sql_int(row.get("request_size")?),
            from_sql_int(row.get("response_size")?),
        )
        .with_client_ip(row.get("client_ip")?)
        .with_user_agent(row.get("user_agent")?)
        .with_response_time_ms(row.get("response_time_ms")?)
        .with_id(row.get("id")?);

        Ok(event)
    }

    // ============================================
    // Aggregations
    // ============================================

    /// Request totals and per method/status/path frequency tables
    pub fn traffic_summary(&self, filter: &EventFilter) -> Result<TrafficSummary> {
        let (clause, params) = filter_clause(filter);
        let sql = format!(
            "SELECT method, status_code, path, total_bandwidth, response_time_ms \
             FROM capture_events{}",
            clause
        );

        let conn = self.conn();
        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_refs.as_slice())?;

        let mut acc = SummaryAccumulator::new();
        while let Some(row) = rows.next()? {
            let method: String = row.get(0)?;
            let path: String = row.get(2)?;
            acc.add(
                &method,
                row.get(1)?,
                &path,
                from_sql_int(row.get(3)?),
                row.get(4)?,
            );
        }

        Ok(acc.finish())
    }

    /// Sum/average/max of request and response sizes
    pub fn bandwidth_stats(&self, filter: &EventFilter) -> Result<BandwidthStats> {
        let (clause, params) = filter_clause(filter);
        let sql = format!(
            r#"
            SELECT
                COALESCE(SUM(request_size), 0),
                COALESCE(SUM(response_size), 0),
                COALESCE(SUM(total_bandwidth), 0),
                AVG(request_size),
                AVG(response_size),
                COALESCE(MAX(request_size), 0),
                COALESCE(MAX(response_size), 0)
            FROM capture_events{}
            "#,
            clause
        );

        let conn = self.conn();
        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let stats = conn.query_row(&sql, params_refs.as_slice(), |row| {
            Ok(BandwidthStats {
                total_request_size: from_sql_int(row.get(0)?),
                total_response_size: from_sql_int(row.get(1)?),
                total_bandwidth: from_sql_int(row.get(2)?),
                avg_request_size: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                avg_response_size: row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                max_request_size: from_sql_int(row.get(5)?),
                max_response_size: from_sql_int(row.get(6)?),
            })
        })?;

        Ok(stats)
    }

    /// Request counts grouped by (client IP, UTC day, path)
    ///
    /// Events without a client IP are skipped. Rows are ordered by day
    /// descending, then count descending; IP and path break remaining ties.
    pub fn ip_day_path_counts(&self, filter: &EventFilter) -> Result<Vec<IpDayPathCount>> {
        let (clause, params) = filter_clause(filter);
        let sql = format!(
            r#"
            SELECT client_ip, substr(ts, 1, 10) AS day, path, COUNT(*) AS request_count
            FROM capture_events{} AND client_ip IS NOT NULL
            GROUP BY client_ip, day, path
            ORDER BY day DESC, request_count DESC, client_ip ASC, path ASC
            "#,
            clause
        );

        let conn = self.conn();
        let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok(IpDayPathCount {
                    client_ip: row.get(0)?,
                    date: row.get(1)?,
                    path: row.get(2)?,
                    request_count: from_sql_int(row.get(3)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

/// Build a `WHERE` clause (always present, so callers may append `AND ...`)
fn filter_clause(filter: &EventFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut sql = String::from(" WHERE 1=1");
    let mut params: Vec<Box<dyn ToSql>> = vec![];

    if let Some(start) = &filter.start {
        sql.push_str(" AND ts >= ?");
        params.push(Box::new(encode_ts(start)));
    }

    if let Some(end) = &filter.end {
        sql.push_str(" AND ts <= ?");
        params.push(Box::new(encode_ts(end)));
    }

    if let Some(method) = &filter.method {
        sql.push_str(" AND method = ?");
        params.push(Box::new(method.clone()));
    }

    // instr keeps the needle literal; LIKE would treat % and _ as wildcards
    if let Some(path) = &filter.path {
        sql.push_str(" AND instr(lower(path), lower(?)) > 0");
        params.push(Box::new(path.clone()));
    }

    if let Some(status_code) = filter.status_code {
        sql.push_str(" AND status_code = ?");
        params.push(Box::new(status_code));
    }

    (sql, params)
}

/// Fixed-width UTC encoding; lexical order matches chronological order.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn decode_ts(value: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
