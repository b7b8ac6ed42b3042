//! Artifact locations and run settings.
//!
//! Defaults match the usual `data/` layout. Values can come from a JSON file
//! ([`PipelineConfig::load`]) and are then overridden by environment
//! variables ([`PipelineConfig::with_env_overrides`]), which `main` loads from
//! `.env` first.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::zones::MapOptions;

pub const DUCKDB_DATABASE_ENV: &str = "DUCKDB_DATABASE";
pub const TRIPS_BY_WEEK_ENV: &str = "TRIPS_BY_WEEK_FILE_PATH";
pub const MANHATTAN_STATS_ENV: &str = "MANHATTAN_STATS_FILE_PATH";
pub const MANHATTAN_MAP_ENV: &str = "MANHATTAN_MAP_FILE_PATH";
pub const TARGET_BOROUGH_ENV: &str = "TARGET_BOROUGH";
pub const MAP_WIDTH_ENV: &str = "MAP_WIDTH_PX";

/// Where each artifact lives and which borough the zone job targets.
///
/// Stored on disk as a JSON object; any field may be omitted:
/// ```json
/// {
///   "database_path": "data/staging/data.duckdb",
///   "trips_by_week_path": "data/outputs/trips_by_week.csv",
///   "borough": "Manhattan"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub database_path: PathBuf,
    pub trips_by_week_path: PathBuf,
    pub manhattan_stats_path: PathBuf,
    pub manhattan_map_path: PathBuf,
    pub borough: String,
    pub map_width_px: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/staging/data.duckdb"),
            trips_by_week_path: PathBuf::from("data/outputs/trips_by_week.csv"),
            manhattan_stats_path: PathBuf::from("data/staging/manhattan_stats.geojson"),
            manhattan_map_path: PathBuf::from("data/outputs/manhattan_map.png"),
            borough: "Manhattan".to_string(),
            map_width_px: MapOptions::default().width_px,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config '{}'", path.display()))?;
        Ok(config)
    }

    /// Defaults overridden by whatever environment variables are set.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Applies environment overrides on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup(DUCKDB_DATABASE_ENV) {
            self.database_path = v.into();
        }
        if let Some(v) = lookup(TRIPS_BY_WEEK_ENV) {
            self.trips_by_week_path = v.into();
        }
        if let Some(v) = lookup(MANHATTAN_STATS_ENV) {
            self.manhattan_stats_path = v.into();
        }
        if let Some(v) = lookup(MANHATTAN_MAP_ENV) {
            self.manhattan_map_path = v.into();
        }
        if let Some(v) = lookup(TARGET_BOROUGH_ENV) {
            self.borough = v;
        }
        if let Some(v) = lookup(MAP_WIDTH_ENV) {
            self.map_width_px = v
                .parse()
                .with_context(|| format!("{MAP_WIDTH_ENV} must be a pixel count, got '{v}'"))?;
        }
        Ok(self)
    }

    /// All artifacts under `dir`, keeping the default file names.
    pub fn rooted_at(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            database_path: dir.join("data.duckdb"),
            trips_by_week_path: dir.join("outputs").join("trips_by_week.csv"),
            manhattan_stats_path: dir.join("staging").join("manhattan_stats.geojson"),
            manhattan_map_path: dir.join("outputs").join("manhattan_map.png"),
            ..Self::default()
        }
    }

    pub fn map_options(&self) -> MapOptions {
        MapOptions {
            width_px: self.map_width_px,
            ..MapOptions::default()
        }
    }

    /// The three published artifacts, in dependency order.
    pub fn artifact_paths(&self) -> [&Path; 3] {
        [
            self.manhattan_stats_path.as_path(),
            self.manhattan_map_path.as_path(),
            self.trips_by_week_path.as_path(),
        ]
    }
}
