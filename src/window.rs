//! Weekly partition windows.
//!
//! A partition key is a date string supplied by whatever schedules the run.
//! [`resolve`] maps it to the half-open `[start, start + 7d)` window that the
//! aggregation and the warehouse filter both use, so the week boundary is
//! computed in exactly one place ([`truncate_to_week`]).

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Format used for partition keys and for the `period` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Length of one partition window.
pub const WEEK_DAYS: i64 = 7;

/// First and end-exclusive dates of the default weekly partition range.
pub const DEFAULT_PARTITION_START: &str = "2023-03-01";
pub const DEFAULT_PARTITION_END: &str = "2023-04-01";

/// A half-open `[start, end)` interval covering exactly one week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl TimeWindow {
    /// The week containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let start = truncate_to_week(date);
        Self {
            start,
            end: start + Duration::days(WEEK_DAYS),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Midnight at the start of the window, inclusive.
    pub fn start_timestamp(&self) -> NaiveDateTime {
        self.start.and_time(chrono::NaiveTime::MIN)
    }

    /// Midnight at the end of the window, exclusive.
    pub fn end_timestamp(&self) -> NaiveDateTime {
        self.end.and_time(chrono::NaiveTime::MIN)
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start_timestamp() && ts < self.end_timestamp()
    }

    /// The window immediately after this one.
    pub fn next(&self) -> Self {
        Self {
            start: self.end,
            end: self.end + Duration::days(WEEK_DAYS),
        }
    }

    /// The partition key that names this window.
    pub fn partition_key(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

/// Returns the Monday on or before `date`.
///
/// This is the ISO week start, the same boundary DuckDB's
/// `date_trunc('week', ...)` produces.
pub fn truncate_to_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Parses a partition key and resolves it to its weekly window.
///
/// Accepts `YYYY-MM-DD`, optionally followed by a time component
/// (`T` or space separated), surrounded by any whitespace.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidPartitionKey`] if the key is not a calendar date.
pub fn resolve(partition_key: &str) -> Result<TimeWindow, PipelineError> {
    let date = parse_partition_key(partition_key)?;
    Ok(TimeWindow::containing(date))
}

fn parse_partition_key(partition_key: &str) -> Result<NaiveDate, PipelineError> {
    let trimmed = partition_key.trim();
    let date_part = trimmed
        .split_once(['T', ' '])
        .map_or(trimmed, |(date, _)| date);

    NaiveDate::parse_from_str(date_part, DATE_FORMAT).map_err(|source| {
        PipelineError::InvalidPartitionKey {
            key: partition_key.to_string(),
            source,
        }
    })
}

/// Enumerates the partition keys of every week that intersects `[start, end)`.
pub fn weekly_partition_keys(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    let mut keys = Vec::new();
    let mut window = TimeWindow::containing(start);

    while window.start() < end {
        keys.push(window.partition_key());
        window = window.next();
    }

    keys
}

/// [`weekly_partition_keys`] for two date strings.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidPartitionKey`] if either bound is not a date.
pub fn weekly_partition_keys_between(start: &str, end: &str) -> Result<Vec<String>, PipelineError> {
    Ok(weekly_partition_keys(
        parse_partition_key(start)?,
        parse_partition_key(end)?,
    ))
}
