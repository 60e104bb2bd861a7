//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: capture event log
    r#"
    -- Append-only; rows are removed only by retention cleanup or a full drop.
    -- ts is fixed-width UTC text (YYYY-MM-DDTHH:MM:SS.ffffffZ) so that
    -- lexical order is chronological and substr(ts, 1, 10) is the UTC day.
    CREATE TABLE IF NOT EXISTS capture_events (
        id               TEXT PRIMARY KEY,
        ts               TEXT NOT NULL,
        method           TEXT NOT NULL,
        path             TEXT NOT NULL,
        status_code      INTEGER NOT NULL,
        request_size     INTEGER NOT NULL CHECK (request_size >= 0),
        response_size    INTEGER NOT NULL CHECK (response_size >= 0),
        total_bandwidth  INTEGER NOT NULL,
        client_ip        TEXT,
        user_agent       TEXT,
        response_time_ms REAL CHECK (response_time_ms IS NULL OR response_time_ms >= 0),

        CHECK (total_bandwidth = request_size + response_size)
    );

    CREATE INDEX IF NOT EXISTS idx_capture_events_ts ON capture_events(ts);
    CREATE INDEX IF NOT EXISTS idx_capture_events_client_ts ON capture_events(client_ip, ts);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
