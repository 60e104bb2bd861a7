//! Per-client request tallies.
//!
//! The store produces one [`IpDayPathCount`] row per (client IP, UTC day, path);
//! [`IpStatsReport::from_rows`] rolls those rows up per client.

use serde::Serialize;
use std::collections::HashMap;

/// Number of requests one client made to one path on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpDayPathCount {
    pub client_ip: String,
    /// UTC calendar day, `YYYY-MM-DD`
    pub date: String,
    pub path: String,
    pub request_count: u64,
}

/// A row of an [`IpSummary`] breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayPathCount {
    pub date: String,
    pub path: String,
    pub request_count: u64,
}

/// All activity from one client IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpSummary {
    pub client_ip: String,
    pub total_requests: u64,
    pub by_day_and_path: Vec<DayPathCount>,
}

/// Per-IP rollup plus the raw grouped rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpStatsReport {
    pub total_unique_ips: usize,
    /// Sorted by `total_requests` descending; ties keep first-seen order
    pub ip_statistics: Vec<IpSummary>,
    pub raw_data: Vec<IpDayPathCount>,
}

impl IpStatsReport {
    /// Roll grouped rows up per client, preserving row order within each client.
    pub fn from_rows(rows: Vec<IpDayPathCount>) -> Self {
        let mut summaries: Vec<IpSummary> = Vec::new();
        {
            let mut index: HashMap<&str, usize> = HashMap::new();
            for row in &rows {
                let slot = *index.entry(row.client_ip.as_str()).or_insert_with(|| {
                    summaries.push(IpSummary {
                        client_ip: row.client_ip.clone(),
                        total_requests: 0,
                        by_day_and_path: Vec::new(),
                    });
                    summaries.len() - 1
                });

                let summary = &mut summaries[slot];
                summary.total_requests += row.request_count;
                summary.by_day_and_path.push(DayPathCount {
                    date: row.date.clone(),
                    path: row.path.clone(),
                    request_count: row.request_count,
                });
            }
        }

        // sort_by is stable, so equal totals keep first-seen order
        summaries.sort_by(|a, b| b.total_requests.cmp(&a.total_requests));

        Self {
            total_unique_ips: summaries.len(),
            ip_statistics: summaries,
            raw_data: rows,
        }
    }
}
