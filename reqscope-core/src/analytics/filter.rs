//! Event filters and the date parsing rules used to build them.
//!
//! Query parameters arrive as strings; everything here turns them into an
//! [`EventFilter`] or rejects them with [`Error::InvalidFilter`] before any
//! storage work happens.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Upper limit on `days` lookbacks (~270 years) so range math cannot overflow.
pub const MAX_LOOKBACK_DAYS: i64 = 100_000;

/// Conjunction of optional criteria over capture events.
///
/// Absent criteria impose no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    /// Inclusive lower timestamp bound
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper timestamp bound
    pub end: Option<DateTime<Utc>>,
    /// Exact HTTP method
    pub method: Option<String>,
    /// Case-insensitive path substring
    pub path: Option<String>,
    /// Exact response status
    pub status_code: Option<u16>,
}

impl EventFilter {
    /// Filter covering `[now - days, now]`.
    pub fn last_days(days: i64, now: DateTime<Utc>) -> Result<Self> {
        if days < 1 {
            return Err(Error::InvalidFilter("days must be at least 1".to_string()));
        }
        if days > MAX_LOOKBACK_DAYS {
            return Err(Error::InvalidFilter(format!(
                "days must be at most {}",
                MAX_LOOKBACK_DAYS
            )));
        }
        Ok(Self {
            start: Some(now - Duration::days(days)),
            end: Some(now),
            ..Default::default()
        })
    }

    pub fn with_path(mut self, path: Option<&str>) -> Self {
        self.path = non_empty(path).map(str::to_string);
        self
    }
}

/// Which side of a range a date string describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// A bare date means midnight
    Start,
    /// A bare date means 23:59:59
    End,
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a query date into a UTC instant.
///
/// Tries, in order: RFC 3339 with an offset or `Z`, an ISO date-time with a
/// numeric offset lacking a colon, a naive ISO date-time (taken as UTC), and a
/// plain `YYYY-MM-DD`. `param` names the query parameter in the error message.
pub fn parse_date_bound(param: &str, value: &str, bound: Bound) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        Error::InvalidFilter(format!(
            "Invalid {} format. Use YYYY-MM-DD or ISO format",
            param
        ))
    })?;

    let naive = match bound {
        Bound::Start => date.and_hms_opt(0, 0, 0),
        Bound::End => date.and_hms_opt(23, 59, 59),
    }
    .ok_or_else(|| Error::InvalidFilter(format!("Invalid {} value", param)))?;

    Ok(Utc.from_utc_datetime(&naive))
}

/// Parse optional `start_date`/`end_date` query values into bounds.
pub fn parse_date_range(
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let start = non_empty(start_date)
        .map(|v| parse_date_bound("start_date", v, Bound::Start))
        .transpose()?;
    let end = non_empty(end_date)
        .map(|v| parse_date_bound("end_date", v, Bound::End))
        .transpose()?;
    Ok((start, end))
}

/// Build the time range + path filter shared by all report endpoints.
///
/// A `days` lookback overrides explicit dates entirely.
pub fn report_filter(
    start_date: Option<&str>,
    end_date: Option<&str>,
    days: Option<i64>,
    path: Option<&str>,
    now: DateTime<Utc>,
) -> Result<EventFilter> {
    let filter = match days {
        Some(days) => EventFilter::last_days(days, now)?,
        None => {
            let (start, end) = parse_date_range(start_date, end_date)?;
            EventFilter {
                start,
                end,
                ..Default::default()
            }
        }
    };
    Ok(filter.with_path(path))
}

/// Treat empty query values as absent.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
