//! End-to-end recommendation scenarios over the in-memory engine.
//!
//! Traces are ingested exactly as an ingestion collaborator would hand them
//! over (decoded points plus the ride's average speed), then queried.

use popular_routes::{
    build_graph, extract_segments, recommend, EdgeStore, GpsPoint, MemoryEdgeStore, RouteConfig,
    RouteEngine, SegmentEdge,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Straight trace between two points with `steps` segments.
fn trace(from: GpsPoint, to: GpsPoint, steps: usize) -> Vec<GpsPoint> {
    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            GpsPoint::new(
                from.latitude + (to.latitude - from.latitude) * t,
                from.longitude + (to.longitude - from.longitude) * t,
            )
        })
        .collect()
}

fn joined(legs: &[Vec<GpsPoint>]) -> Vec<GpsPoint> {
    let mut points: Vec<GpsPoint> = Vec::new();
    for leg in legs {
        let skip = usize::from(!points.is_empty());
        points.extend(leg.iter().skip(skip).copied());
    }
    points
}

#[test]
fn test_popular_river_path_beats_direct_road() {
    init_logging();

    let start = GpsPoint::new(46.2000, 6.1400);
    let bend = GpsPoint::new(46.2100, 6.1500);
    let end = GpsPoint::new(46.2000, 6.1600);

    // Direct road ridden once, river path ridden by many riders
    let direct = trace(start, end, 4);
    let river = joined(&[trace(start, bend, 4), trace(bend, end, 4)]);

    let mut engine = RouteEngine::new();
    engine.ingest_points(&direct, 7.0).unwrap();
    for _ in 0..25 {
        engine.ingest_points(&river, 6.0).unwrap();
    }

    // 1 km target: direct edges cost ~0.34 each, river edges sit at the floor
    let route = engine.recommend(start, end, 1.0).unwrap().unwrap();
    assert_eq!(route.path.len(), 9);
    assert!(route
        .path
        .iter()
        .any(|p| (p.latitude - 46.21).abs() < 1e-9 && (p.longitude - 6.15).abs() < 1e-9));
    assert!(route.score > 0.8);
}

#[test]
fn test_diamond_through_store() {
    init_logging();
    let mut store = MemoryEdgeStore::new();

    let a = GpsPoint::new(0.0, 0.0);
    let b = GpsPoint::new(0.0, 0.01);
    let c = GpsPoint::new(0.0, 0.02);
    let d = GpsPoint::new(0.01, 0.01);

    for obs in extract_segments(&[a, b, c]) {
        store.upsert(&obs.start_key, &obs.end_key, 1000.0, 6.0).unwrap();
    }
    for _ in 0..20 {
        for obs in extract_segments(&[a, d, c]) {
            store.upsert(&obs.start_key, &obs.end_key, 1300.0, 6.0).unwrap();
        }
    }

    let edges: Vec<SegmentEdge> = store.edges().unwrap();
    assert_eq!(edges.len(), 4);

    let graph = build_graph(&edges);
    let route = recommend(&graph, &a, &c, 10.0, &RouteConfig::default())
        .unwrap()
        .unwrap();
    assert_eq!(route.path, vec![a, d, c]);
    assert!((route.total_distance_m - 2600.0).abs() < 1e-9);
}

#[test]
fn test_far_away_query_snaps_to_graph() {
    init_logging();
    let mut engine = RouteEngine::new();
    let ride = trace(GpsPoint::new(45.0, 7.0), GpsPoint::new(45.0, 7.01), 10);
    engine.ingest_points(&ride, 5.0).unwrap();

    // Both endpoints lie kilometres away but snap onto the ride's ends
    let route = engine
        .recommend(GpsPoint::new(44.9, 6.9), GpsPoint::new(45.1, 7.2), 30.0)
        .unwrap()
        .unwrap();
    assert_eq!(route.path.first(), Some(&GpsPoint::new(45.0, 7.0)));
    assert_eq!(route.path.last(), Some(&GpsPoint::new(45.0, 7.01)));
}

#[test]
fn test_recommend_json_shape() {
    init_logging();
    let mut engine = RouteEngine::new();
    let ride = trace(GpsPoint::new(45.0, 7.0), GpsPoint::new(45.0, 7.01), 5);
    engine.ingest_points(&ride, 5.0).unwrap();

    let json = engine
        .recommend_json(GpsPoint::new(45.0, 7.0), GpsPoint::new(45.0, 7.01), 30.0)
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["path"].as_array().unwrap().len(), 6);
    assert!(value["path"][0]["latitude"].is_number());
    assert!(value["total_distance_m"].as_f64().unwrap() > 700.0);
    assert!(value["score"].as_f64().unwrap() <= 1.0);
}

#[test]
fn test_invalid_query_is_an_error_not_none() {
    init_logging();
    let mut engine = RouteEngine::new();
    let ride = trace(GpsPoint::new(45.0, 7.0), GpsPoint::new(45.0, 7.01), 5);
    engine.ingest_points(&ride, 5.0).unwrap();

    let err = engine
        .recommend(GpsPoint::new(f64::NAN, 7.0), GpsPoint::new(45.0, 7.01), 30.0)
        .unwrap_err();
    assert!(err.is_bad_input());
}
