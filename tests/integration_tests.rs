use duckdb::Connection;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use trip_metrics::PipelineError;
use trip_metrics::assets::{Assets, backfill};
use trip_metrics::config::PipelineConfig;
use trip_metrics::warehouse::DuckDbWarehouse;
use trip_metrics::window::weekly_partition_keys_between;

const SCHEMA: &str = "
    create table trips (
        vendor_id integer,
        pickup_zone_id integer,
        pickup_datetime timestamp,
        passenger_count double,
        trip_distance double,
        total_amount double
    );
    create table zones (
        zone_id integer,
        zone varchar,
        borough varchar,
        geometry varchar
    );
    insert into zones values
        (1, 'Midtown Center', 'Manhattan',
            'POLYGON((-73.99 40.75, -73.97 40.75, -73.97 40.76, -73.99 40.76, -73.99 40.75))'),
        (2, 'Upper East Side', 'Manhattan',
            'MULTIPOLYGON(((-73.97 40.76, -73.95 40.76, -73.95 40.78, -73.97 40.78, -73.97 40.76)))'),
        (3, 'Astoria', 'Queens',
            'POLYGON((-73.93 40.76, -73.91 40.76, -73.91 40.78, -73.93 40.78, -73.93 40.76))'),
        (4, 'Unmapped', 'Manhattan', null);
";

fn assets_with_trips(dir: &TempDir, trips: &str) -> Arc<Assets<DuckDbWarehouse>> {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    if !trips.is_empty() {
        conn.execute_batch(&format!("insert into trips values {trips};"))
            .unwrap();
    }

    let warehouse = DuckDbWarehouse::from_connection(conn);
    Arc::new(Assets::new(
        PipelineConfig::rooted_at(dir.path()),
        Arc::new(warehouse),
    ))
}

const MARCH_TRIPS: &str = "
    (1, 1, '2023-03-06 08:15:00', 1, 2.0, 10.50),
    (2, 2, '2023-03-10 17:40:00', 2, 1.0, 5.25),
    (1, 1, '2023-03-14 09:00:00', 1, 3.5, 22.00),
    (1, 3, '2023-03-15 12:00:00', 4, 6.0, 31.10),
    (2, 4, '2023-03-29 23:00:00', 1, 0.5, 7.00)
";

#[tokio::test]
async fn test_materialize_week_scenario() {
    let dir = TempDir::new().unwrap();
    let assets = assets_with_trips(&dir, MARCH_TRIPS);

    let summary = assets.materialize_week("2023-03-06").await.unwrap();
    assert_eq!(summary.num_trips, 2);
    assert_eq!(summary.total_amount, 15.75);
    assert_eq!(summary.trip_distance, 3.0);
    assert_eq!(summary.passenger_count, 3);

    let csv = fs::read_to_string(&assets.config().trips_by_week_path).unwrap();
    assert_eq!(
        csv,
        "period,num_trips,total_amount,trip_distance,passenger_count\n2023-03-06,2,15.75,3.0,3\n"
    );
}

#[tokio::test]
async fn test_materialize_week_with_mid_week_key_labels_window_start() {
    let dir = TempDir::new().unwrap();
    let assets = assets_with_trips(&dir, MARCH_TRIPS);

    let summary = assets.materialize_week("2023-03-16").await.unwrap();
    assert_eq!(summary.period.to_string(), "2023-03-13");
    assert_eq!(summary.num_trips, 2);
    assert_eq!(summary.total_amount, 53.1);
}

#[tokio::test]
async fn test_empty_week_is_recorded() {
    let dir = TempDir::new().unwrap();
    let assets = assets_with_trips(&dir, MARCH_TRIPS);

    assets.materialize_week("2023-03-20").await.unwrap();

    let table = assets.weekly_table().unwrap();
    assert_eq!(table.len(), 1);
    let row = &table.rows()[0];
    assert_eq!(row.period.to_string(), "2023-03-20");
    assert_eq!(row.num_trips, 0);
    assert_eq!(row.total_amount, 0.0);
    assert_eq!(row.passenger_count, 0);
}

#[tokio::test]
async fn test_replaying_a_week_leaves_others_alone() {
    let dir = TempDir::new().unwrap();
    let assets = assets_with_trips(&dir, MARCH_TRIPS);

    assets.materialize_week("2023-03-06").await.unwrap();
    assets.materialize_week("2023-03-27").await.unwrap();
    let first_pass = assets.weekly_table().unwrap();

    assets.materialize_week("2023-03-13").await.unwrap();
    assets.materialize_week("2023-03-06").await.unwrap();
    let second_pass = assets.weekly_table().unwrap();

    let periods: Vec<String> = second_pass
        .rows()
        .iter()
        .map(|r| r.period.to_string())
        .collect();
    assert_eq!(periods, vec!["2023-03-06", "2023-03-13", "2023-03-27"]);
    assert_eq!(second_pass.rows()[0], first_pass.rows()[0]);
    assert_eq!(second_pass.rows()[2], first_pass.rows()[1]);
}

#[tokio::test]
async fn test_invalid_partition_key_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let assets = assets_with_trips(&dir, MARCH_TRIPS);

    let err = assets.materialize_week("week nine").await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidPartitionKey { .. }));
    assert!(!assets.config().trips_by_week_path.exists());
}

#[tokio::test]
async fn test_corrupt_table_fails_week() {
    let dir = TempDir::new().unwrap();
    let assets = assets_with_trips(&dir, MARCH_TRIPS);

    let path = &assets.config().trips_by_week_path;
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "period,num_trips,total_amount\n2023-02-27,9,90.0\n").unwrap();

    let err = assets.materialize_week("2023-03-06").await.unwrap_err();
    assert!(matches!(err, PipelineError::CorruptArtifact { .. }));
    assert!(fs::read_to_string(path).unwrap().contains("2023-02-27"));
}

#[tokio::test]
async fn test_missing_trips_table_is_aggregation_failure() {
    let dir = TempDir::new().unwrap();
    let conn = Connection::open_in_memory().unwrap();
    let assets = Assets::new(
        PipelineConfig::rooted_at(dir.path()),
        Arc::new(DuckDbWarehouse::from_connection(conn)),
    );

    let err = assets.materialize_week("2023-03-06").await.unwrap_err();
    match err {
        PipelineError::AggregationFailed { window, .. } => {
            assert_eq!(window.start().to_string(), "2023-03-06")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_backfill_covers_every_week() {
    let dir = TempDir::new().unwrap();
    let assets = assets_with_trips(&dir, MARCH_TRIPS);

    let keys = weekly_partition_keys_between("2023-03-01", "2023-04-01").unwrap();
    let summaries = backfill(assets.clone(), keys.clone(), 3).await.unwrap();
    assert_eq!(summaries.len(), keys.len());

    let table = assets.weekly_table().unwrap();
    let periods: Vec<String> = table.rows().iter().map(|r| r.period.to_string()).collect();
    assert_eq!(periods, keys);

    let trips: u64 = table.rows().iter().map(|r| r.num_trips).sum();
    assert_eq!(trips, 5);
}

#[tokio::test]
async fn test_zone_stats_then_map() {
    let dir = TempDir::new().unwrap();
    let assets = assets_with_trips(&dir, MARCH_TRIPS);

    let zones = assets.materialize_manhattan_stats().await.unwrap();
    assert_eq!(zones, 2);

    let stats = fs::read_to_string(&assets.config().manhattan_stats_path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stats).unwrap();
    let features = json["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert!(
        features
            .iter()
            .all(|f| f["properties"]["borough"] == "Manhattan")
    );

    assets.materialize_manhattan_map().unwrap();
    let image = fs::read(&assets.config().manhattan_map_path).unwrap();
    assert!(image.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_map_without_stats_fails() {
    let dir = TempDir::new().unwrap();
    let assets = assets_with_trips(&dir, MARCH_TRIPS);

    let err = assets.materialize_manhattan_map().unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));
}
