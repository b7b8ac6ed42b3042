use geo::{BoundingRect, Geometry, Polygon as GeoPolygon};
use plotters::prelude::*;
use std::fmt::Display;
use std::path::Path;
use tracing::{info, warn};

use crate::artifact;
use crate::error::PipelineError;
use crate::zones::types::ZoneTripCount;

const MARGIN_PX: u32 = 16;
const MAX_HEIGHT_PX: u32 = 4096;

/// Sampled stops of the Plasma colour scale, low to high.
const PLASMA: [(f64, (u8, u8, u8)); 5] = [
    (0.00, (13, 8, 135)),
    (0.25, (126, 3, 168)),
    (0.50, (204, 71, 120)),
    (0.75, (248, 149, 64)),
    (1.00, (240, 249, 33)),
];

/// Rendering knobs for the choropleth.
#[derive(Debug, Clone)]
pub struct MapOptions {
    /// Image width; height follows the geometry's aspect ratio.
    pub width_px: u32,
    /// Fill opacity of each zone over the white background.
    pub opacity: f64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            width_px: 1024,
            opacity: 0.7,
        }
    }
}

fn render_err(e: impl Display) -> PipelineError {
    PipelineError::render(e.to_string())
}

/// Maps `t` in `0.0..=1.0` onto the Plasma scale.
pub fn plasma(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);

    for pair in PLASMA.windows(2) {
        let (lo_t, lo) = pair[0];
        let (hi_t, hi) = pair[1];
        if t <= hi_t {
            let f = (t - lo_t) / (hi_t - lo_t);
            let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * f).round() as u8;
            return RGBColor(lerp(lo.0, hi.0), lerp(lo.1, hi.1), lerp(lo.2, hi.2));
        }
    }

    let (_, last) = PLASMA[PLASMA.len() - 1];
    RGBColor(last.0, last.1, last.2)
}

fn normalize(value: i64, min: i64, max: i64) -> f64 {
    if max <= min {
        return 1.0;
    }
    (value - min) as f64 / (max - min) as f64
}

fn exterior(polygon: &GeoPolygon<f64>) -> Vec<(f64, f64)> {
    polygon.exterior().coords().map(|c| (c.x, c.y)).collect()
}

/// Outer rings of every polygon in `geometry`. Holes are not drawn.
fn exterior_rings(geometry: &Geometry<f64>) -> Vec<Vec<(f64, f64)>> {
    match geometry {
        Geometry::Polygon(polygon) => vec![exterior(polygon)],
        Geometry::MultiPolygon(polygons) => polygons.iter().map(exterior).collect(),
        Geometry::GeometryCollection(collection) => {
            collection.iter().flat_map(exterior_rings).collect()
        }
        _ => Vec::new(),
    }
}

/// Draws each zone shaded by its trip count and writes the image to `path`.
///
/// Coordinates are treated as lon/lat and projected equirectangularly, with
/// longitude scaled by the cosine of the mid latitude. The image is replaced
/// atomically; the format follows the file extension.
///
/// # Errors
///
/// Returns [`PipelineError::RenderFailed`] if there is nothing to draw or
/// the image cannot be encoded.
#[tracing::instrument(skip(counts, options), fields(zones = counts.len()))]
pub fn render_choropleth(
    counts: &[ZoneTripCount],
    path: &Path,
    options: &MapOptions,
) -> Result<(), PipelineError> {
    let shapes: Vec<(Vec<(f64, f64)>, i64)> = counts
        .iter()
        .flat_map(|c| {
            let rings = exterior_rings(&c.geometry);
            if rings.is_empty() {
                warn!(zone = %c.zone, "Zone geometry has no polygons, skipping");
            }
            rings.into_iter().map(move |ring| (ring, c.num_trips))
        })
        .collect();

    if shapes.is_empty() {
        return Err(PipelineError::render("no zone polygons to draw"));
    }

    let (min_x, min_y, max_x, max_y) = counts
        .iter()
        .filter_map(|c| c.geometry.bounding_rect())
        .fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), rect| {
                (
                    x0.min(rect.min().x),
                    y0.min(rect.min().y),
                    x1.max(rect.max().x),
                    y1.max(rect.max().y),
                )
            },
        );

    let span_x = max_x - min_x;
    let span_y = max_y - min_y;
    if !(span_x > 0.0 && span_y > 0.0) {
        return Err(PipelineError::render("zone polygons have an empty extent"));
    }

    let x_scale = ((min_y + max_y) / 2.0).to_radians().cos().abs().max(f64::EPSILON);
    let aspect = span_y / (span_x * x_scale);
    let width = options.width_px.max(1);
    let height = ((f64::from(width) * aspect).round() as u32).clamp(1, MAX_HEIGHT_PX);

    let (min_trips, max_trips) = shapes
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), (_, n)| (lo.min(*n), hi.max(*n)));

    let tmp = artifact::temp_file_beside(path)?;
    {
        let root = BitMapBackend::new(tmp.path(), (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(MARGIN_PX)
            .build_cartesian_2d(min_x..max_x, min_y..max_y)
            .map_err(render_err)?;

        chart
            .draw_series(shapes.iter().map(|(ring, n)| {
                let color = plasma(normalize(*n, min_trips, max_trips));
                Polygon::new(ring.clone(), color.mix(options.opacity).filled())
            }))
            .map_err(render_err)?;

        chart
            .draw_series(
                shapes
                    .iter()
                    .map(|(ring, _)| PathElement::new(ring.clone(), BLACK.mix(0.4).stroke_width(1))),
            )
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
    }
    artifact::commit(tmp, path)?;

    info!(path = %path.display(), width, height, "Choropleth written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, polygon};
    use std::fs;
    use tempfile::TempDir;

    fn zone(name: &str, x: f64, num_trips: i64) -> ZoneTripCount {
        ZoneTripCount {
            zone: name.to_string(),
            borough: "Manhattan".to_string(),
            geometry: Geometry::Polygon(polygon![
                (x: x, y: 40.70),
                (x: x + 0.01, y: 40.70),
                (x: x + 0.01, y: 40.72),
                (x: x, y: 40.72),
            ]),
            num_trips,
        }
    }

    #[test]
    fn test_plasma_endpoints() {
        assert_eq!(plasma(0.0).rgb(), (13, 8, 135));
        assert_eq!(plasma(1.0).rgb(), (240, 249, 33));
        assert_eq!(plasma(2.0).rgb(), (240, 249, 33));
        assert_eq!(plasma(0.5).rgb(), (204, 71, 120));
    }

    #[test]
    fn test_normalize_flat_range() {
        assert_eq!(normalize(5, 5, 5), 1.0);
        assert_eq!(normalize(5, 0, 10), 0.5);
    }

    #[test]
    fn test_render_writes_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("outputs").join("manhattan_map.png");
        let counts = vec![zone("A", -74.00, 10), zone("B", -73.99, 250)];

        let options = MapOptions {
            width_px: 200,
            ..MapOptions::default()
        };
        render_choropleth(&counts, &path, &options).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_render_without_polygons_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("map.png");

        let err = render_choropleth(&[], &path, &MapOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::RenderFailed { .. }));

        let line = ZoneTripCount {
            zone: "Line".to_string(),
            borough: "Manhattan".to_string(),
            geometry: Geometry::LineString(LineString::from(vec![(0.0, 0.0), (1.0, 1.0)])),
            num_trips: 1,
        };
        let err = render_choropleth(&[line], &path, &MapOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::RenderFailed { .. }));
        assert!(!path.exists());
    }
}
