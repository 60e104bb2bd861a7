//! Analytics module for reqscope
//!
//! Turns the raw capture event log into reports:
//! - Filters over time range, method, path and status ([`filter`])
//! - Traffic summary and bandwidth statistics ([`summary`])
//! - Per-client IP/day/path tallies and the per-IP rollup ([`ip_stats`])
//!
//! The SQL that feeds these types lives in [`crate::db::repo`]; this module owns
//! the shapes, the date parsing rules and the in-memory accumulation.

pub mod filter;
pub mod ip_stats;
pub mod summary;

pub use filter::{parse_date_bound, parse_date_range, report_filter, Bound, EventFilter};
pub use ip_stats::{DayPathCount, IpDayPathCount, IpStatsReport, IpSummary};
pub use summary::{BandwidthStats, FormattedBandwidth, SummaryAccumulator, TrafficSummary};
