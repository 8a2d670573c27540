//! 位置上报：校验、共享范围和后台副作用

mod common;

use common::{BASE, Harness};
use geotrack::error::AppError;
use geotrack::location::{ConnectionType, Coordinates, DeviceMetadata};
use geotrack::membership::{GroupStatus, MemberStatus};
use geotrack::store::LocationStore;

#[tokio::test]
async fn scope_includes_only_active_sharing_groups() {
    let h = Harness::new();
    h.group("sharing", "Family", true, &["alice"]);
    h.group("not-sharing", "Book club", false, &["alice"]);
    h.group("archived", "Old trip", true, &["alice"]);
    h.mem.directory.set_group_status("archived", GroupStatus::Archived);
    h.group("muted", "Work", true, &[]);
    h.mem.directory.set_member("muted", "alice", MemberStatus::Muted);

    let ingested = h.report("alice", BASE).await;
    let scope: Vec<&str> = ingested
        .sample
        .shared_with_group_ids
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(scope, ["sharing"]);
}

#[tokio::test]
async fn sample_without_groups_is_still_stored() {
    let h = Harness::new();
    let ingested = h.report("loner", BASE).await;

    assert!(ingested.sample.shared_with_group_ids.is_empty());
    assert_eq!(h.mem.locations.sample_count("loner"), 1);
    let latest = h.mem.locations.latest_for_user("loner").await.unwrap().unwrap();
    assert_eq!(latest.sample_id, ingested.sample.sample_id);
}

#[tokio::test]
async fn scope_is_a_snapshot_at_write_time() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice"]);
    let first = h.report("alice", BASE).await;

    h.mem.directory.set_location_sharing("g1", false);
    let second = h.report("alice", BASE).await;

    assert!(first.sample.is_shared_with("g1"));
    assert!(!second.sample.is_shared_with("g1"));
    // 之前写入的样本不受影响
    let in_group = h.mem.locations.latest_in_group("alice", "g1").await.unwrap().unwrap();
    assert_eq!(in_group.sample_id, first.sample.sample_id);
}

#[tokio::test]
async fn invalid_coordinates_are_rejected_without_side_effects() {
    let h = Harness::new();

    for (lat, lon) in [(91.0, 0.0), (-90.5, 0.0), (0.0, 181.0), (f64::NAN, 0.0)] {
        let err = h
            .state
            .locations
            .ingest("alice", Coordinates::new(lat, lon), DeviceMetadata::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation(_)), "({lat}, {lon}) -> {err:?}");
    }

    assert_eq!(h.mem.locations.sample_count("alice"), 0);
    assert!(h.mem.recorder.points().is_empty());
}

#[tokio::test]
async fn invalid_battery_level_is_rejected() {
    let h = Harness::new();
    let device = DeviceMetadata {
        battery_level: Some(120.0),
        ..Default::default()
    };
    let result = h
        .state
        .locations
        .ingest("alice", Coordinates::new(1.0, 1.0), device)
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn boundary_coordinates_are_accepted() {
    let h = Harness::new();
    for (lat, lon) in [(90.0, 180.0), (-90.0, -180.0), (0.0, 0.0)] {
        h.report("alice", (lat, lon)).await;
    }
    assert_eq!(h.mem.locations.sample_count("alice"), 3);
}

#[tokio::test]
async fn time_series_receives_every_sample() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice"]);

    let device = DeviceMetadata {
        device_id: Some("pixel-7".into()),
        battery_level: Some(64.0),
        connection_type: Some(ConnectionType::Cellular),
    };
    let ingested = h
        .state
        .locations
        .ingest("alice", Coordinates::new(BASE.0, BASE.1), device)
        .await
        .unwrap();
    // 一个写时序库，一个评估接近提醒
    assert_eq!(ingested.background.len(), 2);
    let sample = ingested.sample.clone();
    ingested.background.join().await;

    let points = h.mem.recorder.points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].sample_id, sample.sample_id);
    assert_eq!(points[0].battery_level, Some(64.0));
    assert_eq!(points[0].connection_type, ConnectionType::Cellular);
    assert_eq!(points[0].device_id.as_deref(), Some("pixel-7"));
}

#[tokio::test]
async fn optional_fields_are_preserved() {
    let h = Harness::new();
    let coords = Coordinates {
        altitude: Some(44.5),
        accuracy: Some(5.0),
        heading: Some(270.0),
        speed: Some(1.2),
        ..Coordinates::new(BASE.0, BASE.1)
    };
    let ingested = h
        .state
        .locations
        .ingest("alice", coords, DeviceMetadata::default())
        .await
        .unwrap();
    ingested.background.join().await;

    let stored = h.mem.locations.latest_for_user("alice").await.unwrap().unwrap();
    assert_eq!(stored.coordinates, coords);
    assert_eq!(stored.connection_type, ConnectionType::Wifi);
}
