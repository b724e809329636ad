//! Parsing helpers shared by the CLI and the HTTP layer.
//!
//! Both surfaces accept list-valued parameters as comma-separated strings
//! and date bounds as either `YYYY-MM-DD` or raw Unix seconds.

use anyhow::{bail, Result};
use chrono::NaiveDate;

/// Split `"a, b,,c"` into `["a", "b", "c"]`. Blank input yields `None`.
pub fn split_list(raw: Option<&str>) -> Option<Vec<String>> {
    let values: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Which end of a calendar day a date bound refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBound {
    /// 00:00:00 UTC, for `since` / `date_from`.
    Start,
    /// 23:59:59 UTC, for `until` / `date_to`.
    End,
}

/// Parse a date bound into Unix seconds.
pub fn parse_date_bound(raw: &str, bound: DayBound) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(ts) = raw.parse::<i64>() {
        return Ok(ts);
    }
    let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") else {
        bail!(
            "invalid date '{}': expected YYYY-MM-DD or Unix seconds",
            raw
        );
    };
    let time = match bound {
        DayBound::Start => date.and_hms_opt(0, 0, 0),
        DayBound::End => date.and_hms_opt(23, 59, 59),
    };
    match time {
        Some(dt) => Ok(dt.and_utc().timestamp()),
        None => bail!("invalid date '{}'", raw),
    }
}

/// Parse an optional date bound.
pub fn parse_optional_date(raw: Option<&str>, bound: DayBound) -> Result<Option<i64>> {
    raw.map(|s| parse_date_bound(s, bound)).transpose()
}
