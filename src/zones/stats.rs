use geo::Geometry;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};
use wkt::TryFromWkt;

use crate::artifact;
use crate::error::PipelineError;
use crate::warehouse::Warehouse;
use crate::zones::types::{ZoneTripCount, ZoneTripRow};

/// Parses the WKT geometry of a warehouse row.
///
/// # Errors
///
/// Returns [`PipelineError::RenderFailed`] if the geometry is not valid WKT.
pub fn parse_zone_row(row: ZoneTripRow) -> Result<ZoneTripCount, PipelineError> {
    let geometry = Geometry::<f64>::try_from_wkt_str(&row.geometry_wkt).map_err(|e| {
        PipelineError::render(format!("zone '{}' has invalid WKT geometry: {e}", row.zone))
    })?;

    Ok(ZoneTripCount {
        zone: row.zone,
        borough: row.borough,
        geometry,
        num_trips: row.num_trips,
    })
}

/// Counts trips per pickup zone in `borough`, with parsed zone polygons.
#[tracing::instrument(skip(warehouse))]
pub async fn compute_zone_trip_counts<W>(
    warehouse: &W,
    borough: &str,
) -> Result<Vec<ZoneTripCount>, PipelineError>
where
    W: Warehouse + ?Sized,
{
    let rows = warehouse.zone_trip_counts(borough).await?;
    debug!(zones = rows.len(), "Parsing zone geometries");

    rows.into_iter().map(parse_zone_row).collect()
}

fn to_feature(count: &ZoneTripCount) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("zone".to_string(), JsonValue::from(count.zone.as_str()));
    properties.insert("borough".to_string(), JsonValue::from(count.borough.as_str()));
    properties.insert("num_trips".to_string(), JsonValue::from(count.num_trips));

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&count.geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Writes the counts as a GeoJSON FeatureCollection, replacing any prior file.
pub fn write_zone_trip_counts(path: &Path, counts: &[ZoneTripCount]) -> Result<(), PipelineError> {
    let collection = FeatureCollection {
        bbox: None,
        features: counts.iter().map(to_feature).collect(),
        foreign_members: None,
    };

    let body = serde_json::to_vec(&collection)
        .map_err(|e| PipelineError::io(path, io::Error::other(e)))?;
    artifact::write_atomic(path, &body)?;

    info!(path = %path.display(), zones = counts.len(), "Zone trip counts written");
    Ok(())
}

fn from_feature(path: &Path, feature: Feature) -> Result<ZoneTripCount, PipelineError> {
    let text_property = |name: &str| {
        feature
            .property(name)
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| PipelineError::corrupt(path, format!("feature without '{name}'")))
    };

    let zone = text_property("zone")?;
    let borough = text_property("borough")?;
    let num_trips = feature
        .property("num_trips")
        .and_then(JsonValue::as_i64)
        .ok_or_else(|| PipelineError::corrupt(path, format!("zone '{zone}' without num_trips")))?;

    let geometry = feature
        .geometry
        .ok_or_else(|| PipelineError::corrupt(path, format!("zone '{zone}' without geometry")))?;
    let geometry = Geometry::<f64>::try_from(geometry)
        .map_err(|e| PipelineError::corrupt(path, format!("zone '{zone}': {e}")))?;

    Ok(ZoneTripCount {
        zone,
        borough,
        geometry,
        num_trips,
    })
}

/// Reads a FeatureCollection written by [`write_zone_trip_counts`].
///
/// # Errors
///
/// Returns [`PipelineError::CorruptArtifact`] if the document is not a
/// FeatureCollection of zone features.
pub fn read_zone_trip_counts(path: &Path) -> Result<Vec<ZoneTripCount>, PipelineError> {
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;

    let collection = match text.parse::<GeoJson>() {
        Ok(GeoJson::FeatureCollection(collection)) => collection,
        Ok(_) => return Err(PipelineError::corrupt(path, "not a FeatureCollection")),
        Err(e) => return Err(PipelineError::corrupt(path, e.to_string())),
    };

    collection
        .features
        .into_iter()
        .map(|feature| from_feature(path, feature))
        .collect()
}
