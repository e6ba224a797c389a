//! SQLite edge store integration tests.
//!
//! Covers the on-disk lifecycle: ingest -> close -> reopen -> recommend.
//!
//! Run with: `cargo test --features persistence --test sqlite_store`

use popular_routes::{
    ActivitySummary, EdgeStore, GpsPoint, NodeKey, RouteEngine, SqliteEdgeStore,
};
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Helper: path of a fresh database inside a temp dir.
fn temp_db() -> (TempDir, String) {
    let tmp_dir = TempDir::new().expect("failed to create temp dir");
    let db_path = tmp_dir
        .path()
        .join("edges.db")
        .to_str()
        .expect("utf-8 temp path")
        .to_string();
    (tmp_dir, db_path)
}

fn ride(id: &str, points: &[GpsPoint]) -> ActivitySummary {
    // LineString expects (x, y) = (lng, lat)
    let line: geo::LineString<f64> = points.iter().map(|p| (p.longitude, p.latitude)).collect();
    ActivitySummary {
        id: id.to_string(),
        name: format!("Ride {}", id),
        sport_type: "Ride".to_string(),
        summary_polyline: Some(
            polyline::encode_coordinates(line, 5).expect("encodable trace"),
        ),
        distance_m: 2000.0,
        moving_time_s: 400,
    }
}

fn corridor() -> Vec<GpsPoint> {
    (0..=20)
        .map(|i| GpsPoint::new(47.3769, 8.5417 + i as f64 * 0.001))
        .collect()
}

#[test]
fn test_edges_survive_reopen() {
    init_logging();
    let (_tmp, db_path) = temp_db();

    {
        let mut engine = RouteEngine::open(&db_path).unwrap();
        let stats = engine
            .ingest_activities(&[ride("1", &corridor()), ride("2", &corridor())])
            .unwrap();
        assert_eq!(stats.activities_ingested, 2);
        assert_eq!(engine.edge_count().unwrap(), 20);
    }

    let store = SqliteEdgeStore::open(&db_path).unwrap();
    let edges = store.edges().unwrap();
    assert_eq!(edges.len(), 20);
    for edge in &edges {
        assert_eq!(edge.popularity_count, 2);
        assert!((edge.avg_speed_mps - 5.0).abs() < 1e-9);
        assert!(NodeKey::parse(edge.start_key.as_str()).is_ok());
    }

    let mut engine = RouteEngine::with_store(store);
    let route = engine
        .recommend(GpsPoint::new(47.3769, 8.5417), GpsPoint::new(47.3769, 8.5617), 10.0)
        .unwrap()
        .expect("corridor is routable");
    assert_eq!(route.path.len(), 21);
}

#[test]
fn test_reingest_resets_popularity() {
    init_logging();
    let (_tmp, db_path) = temp_db();
    let mut engine = RouteEngine::open(&db_path).unwrap();

    engine.ingest_activities(&[ride("1", &corridor())]).unwrap();
    engine.ingest_activities(&[ride("1", &corridor())]).unwrap();
    assert!(engine.edges().unwrap().iter().all(|e| e.popularity_count == 2));

    engine.reingest_activities(&[ride("1", &corridor())]).unwrap();
    assert!(engine.edges().unwrap().iter().all(|e| e.popularity_count == 1));
}

#[test]
fn test_memory_and_sqlite_agree() {
    init_logging();
    let (_tmp, db_path) = temp_db();
    let activities = vec![
        ride("a", &corridor()),
        ride("b", &corridor()[5..15]),
        ride("c", &corridor().into_iter().rev().collect::<Vec<_>>()),
    ];

    let mut memory = RouteEngine::new();
    memory.ingest_activities(&activities).unwrap();

    let mut sqlite = RouteEngine::open(&db_path).unwrap();
    sqlite.ingest_activities(&activities).unwrap();

    let mem_edges = memory.edges().unwrap();
    let sql_edges = sqlite.edges().unwrap();
    assert_eq!(mem_edges.len(), sql_edges.len());
    for (m, s) in mem_edges.iter().zip(&sql_edges) {
        assert_eq!(m.start_key, s.start_key);
        assert_eq!(m.end_key, s.end_key);
        assert_eq!(m.popularity_count, s.popularity_count);
        assert!((m.distance_m - s.distance_m).abs() < 1e-9);
        assert!((m.avg_speed_mps - s.avg_speed_mps).abs() < 1e-9);
    }
}
