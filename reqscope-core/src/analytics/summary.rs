//! Traffic summary and bandwidth report types.

use crate::format::format_bytes;
use serde::Serialize;
use std::collections::BTreeMap;

/// Overall traffic summary for a set of capture events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficSummary {
    pub total_requests: u64,
    pub total_bandwidth: u64,
    /// Mean over events that recorded a response time; `None` if none did
    pub average_response_time_ms: Option<f64>,
    pub requests_by_method: BTreeMap<String, u64>,
    pub requests_by_status: BTreeMap<u16, u64>,
    pub requests_by_endpoint: BTreeMap<String, u64>,
}

/// Single-pass accumulator producing a [`TrafficSummary`].
///
/// Each row bumps the total counters and every frequency table at once.
#[derive(Debug, Default)]
pub struct SummaryAccumulator {
    summary: TrafficSummary,
    response_time_total: f64,
    response_time_samples: u64,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        method: &str,
        status_code: u16,
        path: &str,
        total_bandwidth: u64,
        response_time_ms: Option<f64>,
    ) {
        let summary = &mut self.summary;
        summary.total_requests += 1;
        summary.total_bandwidth = summary.total_bandwidth.saturating_add(total_bandwidth);

        *summary
            .requests_by_method
            .entry(method.to_string())
            .or_default() += 1;
        *summary.requests_by_status.entry(status_code).or_default() += 1;
        *summary
            .requests_by_endpoint
            .entry(path.to_string())
            .or_default() += 1;

        if let Some(ms) = response_time_ms {
            self.response_time_total += ms;
            self.response_time_samples += 1;
        }
    }

    pub fn finish(self) -> TrafficSummary {
        let mut summary = self.summary;
        summary.average_response_time_ms = (self.response_time_samples > 0)
            .then(|| self.response_time_total / self.response_time_samples as f64);
        summary
    }
}

/// Request/response size statistics. All zero when nothing matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BandwidthStats {
    pub total_request_size: u64,
    pub total_response_size: u64,
    pub total_bandwidth: u64,
    pub avg_request_size: f64,
    pub avg_response_size: f64,
    pub max_request_size: u64,
    pub max_response_size: u64,
}

impl BandwidthStats {
    /// Attach human-readable strings to every figure.
    pub fn formatted(self) -> FormattedBandwidth {
        FormattedBandwidth {
            total_request_size_formatted: format_bytes(self.total_request_size as f64),
            total_response_size_formatted: format_bytes(self.total_response_size as f64),
            total_bandwidth_formatted: format_bytes(self.total_bandwidth as f64),
            avg_request_size_formatted: format_bytes(self.avg_request_size),
            avg_response_size_formatted: format_bytes(self.avg_response_size),
            max_request_size_formatted: format_bytes(self.max_request_size as f64),
            max_response_size_formatted: format_bytes(self.max_response_size as f64),
            stats: self,
        }
    }
}

/// [`BandwidthStats`] plus formatted strings, as served by the API.
#[derive(Debug, Clone, Serialize)]
pub struct FormattedBandwidth {
    #[serde(flatten)]
    pub stats: BandwidthStats,
    pub total_request_size_formatted: String,
    pub total_response_size_formatted: String,
    pub total_bandwidth_formatted: String,
    pub avg_request_size_formatted: String,
    pub avg_response_size_formatted: String,
    pub max_request_size_formatted: String,
    pub max_response_size_formatted: String,
}
