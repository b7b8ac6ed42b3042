use async_trait::async_trait;
use duckdb::{Connection, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use super::Warehouse;
use crate::error::WarehouseError;
use crate::weekly::TripRecord;
use crate::window::TimeWindow;
use crate::zones::ZoneTripRow;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TRIPS_IN_WINDOW_SQL: &str = "
    select
        cast(vendor_id as bigint),
        cast(total_amount as double),
        cast(trip_distance as double),
        cast(passenger_count as double)
    from trips
    where pickup_datetime >= cast(? as timestamp)
      and pickup_datetime < cast(? as timestamp)
";

const ZONE_TRIP_COUNTS_SQL: &str = "
    select
        zones.zone,
        zones.borough,
        zones.geometry,
        count(1) as num_trips
    from trips
    left join zones on trips.pickup_zone_id = zones.zone_id
    where zones.borough = ? and zones.geometry is not null
    group by zones.zone, zones.borough, zones.geometry
    order by zones.zone
";

/// A [`Warehouse`] over a DuckDB database holding `trips` and `zones` tables.
///
/// Every query runs on its own connection cloned from the shared database
/// handle, on tokio's blocking pool; the connection is dropped when the
/// query finishes.
pub struct DuckDbWarehouse {
    conn: Mutex<Connection>,
}

impl DuckDbWarehouse {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WarehouseError> {
        let conn = Connection::open(path)?;
        Ok(Self::from_connection(conn))
    }

    /// Wraps an already-open connection, e.g. an in-memory database.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn connection(&self) -> Result<Connection, WarehouseError> {
        let conn = self.conn.lock().map_err(|_| WarehouseError::Poisoned)?;
        Ok(conn.try_clone()?)
    }
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    #[tracing::instrument(skip_all, fields(window = %window))]
    async fn trips_in_window(&self, window: &TimeWindow) -> Result<Vec<TripRecord>, WarehouseError> {
        let conn = self.connection()?;
        let start = window.start_timestamp().format(TIMESTAMP_FORMAT).to_string();
        let end = window.end_timestamp().format(TIMESTAMP_FORMAT).to_string();

        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<TripRecord>, WarehouseError> {
            let mut stmt = conn.prepare(TRIPS_IN_WINDOW_SQL)?;
            let rows = stmt
                .query_map(params![start, end], |row| {
                    Ok(TripRecord {
                        vendor_id: row.get(0)?,
                        total_amount: row.get(1)?,
                        trip_distance: row.get(2)?,
                        passenger_count: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await??;

        debug!(rows = rows.len(), "Fetched trips for window");
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    async fn zone_trip_counts(&self, borough: &str) -> Result<Vec<ZoneTripRow>, WarehouseError> {
        let conn = self.connection()?;
        let borough = borough.to_string();

        let rows = tokio::task::spawn_blocking(move || -> Result<Vec<ZoneTripRow>, WarehouseError> {
            let mut stmt = conn.prepare(ZONE_TRIP_COUNTS_SQL)?;
            let rows = stmt
                .query_map(params![borough], |row| {
                    Ok(ZoneTripRow {
                        zone: row.get(0)?,
                        borough: row.get(1)?,
                        geometry_wkt: row.get(2)?,
                        num_trips: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await??;

        debug!(zones = rows.len(), "Fetched zone trip counts");
        Ok(rows)
    }
}
