use geo::Geometry;

/// One grouped row as returned by the warehouse, geometry still as WKT.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTripRow {
    pub zone: String,
    pub borough: String,
    pub geometry_wkt: String,
    pub num_trips: i64,
}

/// Trip count for one zone with its parsed polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTripCount {
    pub zone: String,
    pub borough: String,
    pub geometry: Geometry<f64>,
    pub num_trips: i64,
}
