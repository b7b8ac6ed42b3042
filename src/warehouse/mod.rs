//! The SQL warehouse collaborator.
//!
//! [`Warehouse`] is the narrow interface the pipelines need: raw trips for one
//! window and per-zone trip counts for one borough. Both take typed values and
//! never accept SQL fragments. [`DuckDbWarehouse`] is the DuckDB-backed
//! implementation.

mod duckdb_backend;

pub use duckdb_backend::DuckDbWarehouse;

use async_trait::async_trait;

use crate::error::WarehouseError;
use crate::weekly::TripRecord;
use crate::window::TimeWindow;
use crate::zones::ZoneTripRow;

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// All trips whose pickup falls in `[window.start, window.end)`.
    async fn trips_in_window(&self, window: &TimeWindow) -> Result<Vec<TripRecord>, WarehouseError>;

    /// Trip counts per `(zone, borough, geometry)` for one borough, excluding
    /// zones without a geometry.
    async fn zone_trip_counts(&self, borough: &str) -> Result<Vec<ZoneTripRow>, WarehouseError>;
}
