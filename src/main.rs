//! CLI entry point for the trip metrics assets.
//!
//! One subcommand per asset (a weekly partition, the zone stats, the map),
//! plus a weekly backfill, a table dump, and publishing artifacts to S3.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use trip_metrics::{
    assets::{Assets, backfill},
    config::PipelineConfig,
    output::publish_artifacts,
    warehouse::DuckDbWarehouse,
    window::{DEFAULT_PARTITION_END, DEFAULT_PARTITION_START, weekly_partition_keys_between},
};

#[derive(Parser)]
#[command(name = "trip_metrics")]
#[command(about = "Weekly trip rollups and zone trip maps from a DuckDB trips table", long_about = None)]
struct Cli {
    /// Optional JSON config file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute one weekly partition and merge it into the weekly table
    Week {
        /// Any date inside the week (YYYY-MM-DD)
        #[arg(value_name = "PARTITION_KEY")]
        partition_key: String,
    },
    /// Compute every weekly partition in a date range
    Backfill {
        /// First date of the range
        #[arg(long, default_value = DEFAULT_PARTITION_START)]
        start: String,

        /// End of the range, exclusive
        #[arg(long, default_value = DEFAULT_PARTITION_END)]
        end: String,

        /// Maximum number of weeks computed at once
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Count trips per zone in the target borough and write the GeoJSON stats
    ManhattanStats,
    /// Render the zone stats as a choropleth image
    ManhattanMap,
    /// Log the current weekly table
    Show,
    /// Upload the materialized artifacts to S3
    Publish {
        /// S3 bucket name to upload to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: String,

        /// Gzip compress artifacts before uploading
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/trip_metrics.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("trip_metrics.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?.with_env_overrides()?,
        None => PipelineConfig::from_env()?,
    };

    match cli.command {
        Commands::Week { partition_key } => {
            let assets = open_assets(config)?;
            let summary = assets.materialize_week(&partition_key).await?;
            info!(
                period = %summary.period,
                num_trips = summary.num_trips,
                total_amount = summary.total_amount,
                trip_distance = summary.trip_distance,
                passenger_count = summary.passenger_count,
                "Week materialized"
            );
        }
        Commands::Backfill {
            start,
            end,
            concurrency,
        } => {
            let keys = weekly_partition_keys_between(&start, &end)?;
            let assets = Arc::new(open_assets(config)?);
            let summaries = backfill(assets, keys, concurrency).await?;
            info!(weeks = summaries.len(), "Backfill finished");
        }
        Commands::ManhattanStats => {
            let assets = open_assets(config)?;
            let zones = assets.materialize_manhattan_stats().await?;
            info!(zones, path = %assets.config().manhattan_stats_path.display(), "Zone stats materialized");
        }
        Commands::ManhattanMap => {
            let assets = open_assets(config)?;
            assets.materialize_manhattan_map()?;
            info!(path = %assets.config().manhattan_map_path.display(), "Map materialized");
        }
        Commands::Show => {
            let assets = open_assets(config)?;
            let table = assets.weekly_table()?;
            info!(rows = table.len(), "Weekly table");
            for row in table.rows() {
                info!(
                    period = %row.period,
                    num_trips = row.num_trips,
                    total_amount = row.total_amount,
                    trip_distance = row.trip_distance,
                    passenger_count = row.passenger_count,
                    "Week"
                );
            }
        }
        Commands::Publish { s3_bucket, gzip } => {
            let aws = aws_config::load_from_env().await;
            let client = aws_sdk_s3::Client::new(&aws);
            info!(bucket = %s3_bucket, gzip, "S3 upload enabled");
            publish_artifacts(&client, &s3_bucket, &config.artifact_paths(), gzip).await?;
        }
    }

    Ok(())
}

/// Opens the configured DuckDB database and wires it to the assets.
fn open_assets(config: PipelineConfig) -> Result<Assets<DuckDbWarehouse>> {
    info!(database = %config.database_path.display(), "Opening warehouse");
    let warehouse = DuckDbWarehouse::open(&config.database_path)?;
    Ok(Assets::new(config, Arc::new(warehouse)))
}
