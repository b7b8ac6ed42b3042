//! Zone-level trip density and the choropleth map rendered from it.
//!
//! [`stats`] counts trips per pickup zone for one borough and writes the
//! result as a GeoJSON FeatureCollection; [`map`] reads that document back
//! and draws each zone polygon shaded by its trip count. Both artifacts are
//! fully recomputed on every run.

pub mod map;
pub mod stats;
pub mod types;

pub use map::{MapOptions, render_choropleth};
pub use stats::{compute_zone_trip_counts, read_zone_trip_counts, write_zone_trip_counts};
pub use types::{ZoneTripCount, ZoneTripRow};
