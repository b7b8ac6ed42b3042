//! Data types used by the weekly rollup.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Column order of the persisted weekly summary table.
pub const WEEKLY_SUMMARY_COLUMNS: [&str; 5] = [
    "period",
    "num_trips",
    "total_amount",
    "trip_distance",
    "passenger_count",
];

/// One raw trip row, projected to the columns the rollup needs.
///
/// Numeric columns may be null in the warehouse; nulls contribute nothing
/// to the sums but the row still counts as a trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripRecord {
    pub vendor_id: Option<i64>,
    pub total_amount: Option<f64>,
    pub trip_distance: Option<f64>,
    pub passenger_count: Option<f64>,
}

/// Aggregated trips for one weekly window, one row of `trips_by_week.csv`.
///
/// Field order is the persisted column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub period: NaiveDate,
    pub num_trips: u64,
    pub total_amount: f64,
    pub trip_distance: f64,
    pub passenger_count: i64,
}

impl WeeklySummary {
    /// A summary for a window with no trips.
    pub fn empty(period: NaiveDate) -> Self {
        Self {
            period,
            num_trips: 0,
            total_amount: 0.0,
            trip_distance: 0.0,
            passenger_count: 0,
        }
    }
}
