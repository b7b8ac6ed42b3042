//! One entry point per materialized asset.
//!
//! The scheduler decides when each runs and in what order (zone stats before
//! the map, raw trips before either); these functions only do the work for a
//! single invocation and surface every failure to the caller.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{Instrument, error, info};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::store::{WeeklySummaryStore, WeeklySummaryTable};
use crate::warehouse::Warehouse;
use crate::weekly::{WeeklySummary, compute_weekly_summary};
use crate::window::resolve;
use crate::zones::{
    compute_zone_trip_counts, read_zone_trip_counts, render_choropleth, write_zone_trip_counts,
};

pub struct Assets<W: ?Sized> {
    config: PipelineConfig,
    store: WeeklySummaryStore,
    warehouse: Arc<W>,
}

impl<W> Assets<W>
where
    W: Warehouse + ?Sized,
{
    pub fn new(config: PipelineConfig, warehouse: Arc<W>) -> Self {
        let store = WeeklySummaryStore::new(&config.trips_by_week_path);
        Self {
            config,
            store,
            warehouse,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &WeeklySummaryStore {
        &self.store
    }

    /// Current contents of the weekly summary table.
    pub fn weekly_table(&self) -> Result<WeeklySummaryTable, PipelineError> {
        self.store.load()
    }

    /// Computes one week's summary and merges it into the weekly table.
    #[tracing::instrument(skip(self))]
    pub async fn materialize_week(&self, partition_key: &str) -> Result<WeeklySummary, PipelineError> {
        let window = resolve(partition_key)?;
        let summary = compute_weekly_summary(&window, self.warehouse.as_ref()).await?;
        self.store.upsert(summary.clone()).await?;
        Ok(summary)
    }

    /// Recomputes trip counts per zone for the configured borough and writes
    /// them as GeoJSON. Returns the number of zones written.
    #[tracing::instrument(skip(self), fields(borough = %self.config.borough))]
    pub async fn materialize_manhattan_stats(&self) -> Result<usize, PipelineError> {
        let counts = compute_zone_trip_counts(self.warehouse.as_ref(), &self.config.borough).await?;
        write_zone_trip_counts(&self.config.manhattan_stats_path, &counts)?;
        Ok(counts.len())
    }

    /// Renders the zone stats artifact as a choropleth image.
    #[tracing::instrument(skip(self))]
    pub fn materialize_manhattan_map(&self) -> Result<(), PipelineError> {
        let counts = read_zone_trip_counts(&self.config.manhattan_stats_path)?;
        render_choropleth(
            &counts,
            &self.config.manhattan_map_path,
            &self.config.map_options(),
        )
    }
}

/// Materializes every partition in `partition_keys`, at most `concurrency` at a time.
///
/// All partitions are attempted; the first failure (in key order) is returned
/// once every task has finished. Successful weeks stay in the table.
pub async fn backfill<W>(
    assets: Arc<Assets<W>>,
    partition_keys: Vec<String>,
    concurrency: usize,
) -> Result<Vec<WeeklySummary>, PipelineError>
where
    W: Warehouse + ?Sized + 'static,
{
    info!(
        partitions = partition_keys.len(),
        concurrency, "Starting weekly backfill"
    );

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = vec![];

    for key in partition_keys {
        let assets = assets.clone();
        let semaphore = semaphore.clone();
        let span = tracing::info_span!("backfill_week", partition = %key);

        tasks.push(tokio::spawn(
            async move {
                let _permit = semaphore.acquire_owned().await;
                let result = assets.materialize_week(&key).await;
                if let Err(e) = &result {
                    error!(error = %e, "Weekly partition failed");
                }
                result
            }
            .instrument(span),
        ));
    }

    let mut summaries = Vec::new();
    let mut first_error = None;

    for task in tasks {
        match task.await {
            Ok(Ok(summary)) => summaries.push(summary),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(join_error) => {
                first_error.get_or_insert(PipelineError::Warehouse(join_error.into()));
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    summaries.sort_by_key(|s| s.period);
    info!(weeks = summaries.len(), "Weekly backfill complete");
    Ok(summaries)
}
