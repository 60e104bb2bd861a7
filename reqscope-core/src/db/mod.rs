//! Database layer for reqscope
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository methods for inserts, retention, queries and aggregations

pub mod repo;
pub mod schema;

pub use repo::Database;
