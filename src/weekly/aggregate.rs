use tracing::info;

use crate::error::PipelineError;
use crate::warehouse::Warehouse;
use crate::weekly::types::{TripRecord, WeeklySummary};
use crate::weekly::utility::{round2, sum_present};
use crate::window::TimeWindow;

/// Reduces the trips of one window to a single normalized [`WeeklySummary`].
///
/// `num_trips` counts rows, the other columns are sums. Money and distance are
/// rounded to two decimals, passenger count is truncated to an integer, and
/// `period` is the window start. An empty window yields a zero summary.
pub fn summarize(window: &TimeWindow, rows: &[TripRecord]) -> WeeklySummary {
    if rows.is_empty() {
        return WeeklySummary::empty(window.start());
    }

    let total_amount = sum_present(rows.iter().map(|r| r.total_amount));
    let trip_distance = sum_present(rows.iter().map(|r| r.trip_distance));
    let passenger_count = sum_present(rows.iter().map(|r| r.passenger_count));

    WeeklySummary {
        period: window.start(),
        num_trips: rows.len() as u64,
        total_amount: round2(total_amount),
        trip_distance: round2(trip_distance),
        passenger_count: passenger_count as i64,
    }
}

/// Fetches the trips of `window` from the warehouse and summarizes them.
///
/// # Errors
///
/// Any warehouse failure is returned as [`PipelineError::AggregationFailed`]
/// carrying the window. Nothing is retried.
#[tracing::instrument(skip_all, fields(window = %window))]
pub async fn compute_weekly_summary<W>(
    window: &TimeWindow,
    warehouse: &W,
) -> Result<WeeklySummary, PipelineError>
where
    W: Warehouse + ?Sized,
{
    let rows = warehouse
        .trips_in_window(window)
        .await
        .map_err(|source| PipelineError::AggregationFailed {
            window: *window,
            source,
        })?;

    let summary = summarize(window, &rows);

    info!(
        period = %summary.period,
        num_trips = summary.num_trips,
        total_amount = summary.total_amount,
        "Computed weekly summary"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarehouseError;
    use crate::window::resolve;
    use crate::zones::ZoneTripRow;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn trip(amount: f64, distance: f64, passengers: f64) -> TripRecord {
        TripRecord {
            vendor_id: Some(1),
            total_amount: Some(amount),
            trip_distance: Some(distance),
            passenger_count: Some(passengers),
        }
    }

    struct FixedWarehouse(Vec<TripRecord>);

    #[async_trait]
    impl Warehouse for FixedWarehouse {
        async fn trips_in_window(&self, _: &TimeWindow) -> Result<Vec<TripRecord>, WarehouseError> {
            Ok(self.0.clone())
        }

        async fn zone_trip_counts(&self, _: &str) -> Result<Vec<ZoneTripRow>, WarehouseError> {
            Ok(Vec::new())
        }
    }

    struct BrokenWarehouse;

    #[async_trait]
    impl Warehouse for BrokenWarehouse {
        async fn trips_in_window(&self, _: &TimeWindow) -> Result<Vec<TripRecord>, WarehouseError> {
            Err(WarehouseError::Poisoned)
        }

        async fn zone_trip_counts(&self, _: &str) -> Result<Vec<ZoneTripRow>, WarehouseError> {
            Err(WarehouseError::Poisoned)
        }
    }

    #[test]
    fn test_summarize_two_trips() {
        let window = resolve("2023-03-06").unwrap();
        let rows = vec![trip(10.50, 2.0, 1.0), trip(5.25, 1.0, 2.0)];

        let summary = summarize(&window, &rows);

        assert_eq!(
            summary,
            WeeklySummary {
                period: NaiveDate::from_ymd_opt(2023, 3, 6).unwrap(),
                num_trips: 2,
                total_amount: 15.75,
                trip_distance: 3.0,
                passenger_count: 3,
            }
        );
    }

    #[test]
    fn test_summarize_empty_window_is_zero_row() {
        let window = resolve("2023-03-20").unwrap();
        let summary = summarize(&window, &[]);

        assert_eq!(summary, WeeklySummary::empty(window.start()));
        assert_eq!(summary.num_trips, 0);
    }

    #[test]
    fn test_summarize_rounds_sums() {
        let window = resolve("2023-03-06").unwrap();

        let up = summarize(&window, &[trip(10.005, 10.004, 0.0)]);
        assert_eq!(up.total_amount, 10.01);
        assert_eq!(up.trip_distance, 10.0);
    }

    #[test]
    fn test_summarize_counts_rows_with_nulls() {
        let window = resolve("2023-03-06").unwrap();
        let rows = vec![trip(4.0, 1.0, 1.0), TripRecord::default()];

        let summary = summarize(&window, &rows);
        assert_eq!(summary.num_trips, 2);
        assert_eq!(summary.total_amount, 4.0);
        assert_eq!(summary.passenger_count, 1);
    }

    #[test]
    fn test_summarize_period_is_window_start() {
        let window = resolve("2023-03-09").unwrap();
        let summary = summarize(&window, &[trip(1.0, 1.0, 1.0)]);
        assert_eq!(summary.period, window.start());
    }

    #[tokio::test]
    async fn test_compute_weekly_summary_uses_warehouse_rows() {
        let window = resolve("2023-03-06").unwrap();
        let warehouse = FixedWarehouse(vec![trip(10.50, 2.0, 1.0), trip(5.25, 1.0, 2.0)]);

        let summary = compute_weekly_summary(&window, &warehouse).await.unwrap();
        assert_eq!(summary.num_trips, 2);
        assert_eq!(summary.total_amount, 15.75);
    }

    #[tokio::test]
    async fn test_compute_weekly_summary_failure_carries_window() {
        let window = resolve("2023-03-06").unwrap();

        let err = compute_weekly_summary(&window, &BrokenWarehouse)
            .await
            .unwrap_err();

        match err {
            PipelineError::AggregationFailed { window: failed, .. } => assert_eq!(failed, window),
            other => panic!("unexpected error: {other}"),
        }
    }
}
