//! 位置查询的权限与隐私级别

mod common;

use chrono::{Duration, Utc};
use common::{BASE, Harness};
use geotrack::error::AppError;
use geotrack::location::PrivacyLevel;
use geotrack::membership::MemberStatus;

#[tokio::test]
async fn self_view_is_always_precise() {
    let h = Harness::new();
    h.report("alice", (39.904211, 116.407396)).await;
    h.state.locations.set_privacy("alice", PrivacyLevel::Hidden).await.unwrap();

    let view = h.state.locations.current_location("alice", "alice").await.unwrap();
    let coords = view.coordinates.unwrap();
    assert_eq!(coords.latitude, 39.904211);
    assert_eq!(coords.longitude, 116.407396);
    assert_eq!(view.privacy_level, PrivacyLevel::Hidden);
}

#[tokio::test]
async fn stranger_cannot_view_location() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice"]);
    h.group("g2", "Work", true, &["mallory"]);
    h.report("alice", BASE).await;

    let err = h.state.locations.current_location("alice", "mallory").await.unwrap_err();
    assert!(matches!(err, AppError::Permission(_)));
}

#[tokio::test]
async fn privacy_tiers_for_group_peer() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice", "bob"]);
    h.report("alice", (39.904211, 116.407396)).await;

    let view = h.state.locations.current_location("alice", "bob").await.unwrap();
    assert_eq!(view.coordinates.unwrap().latitude, 39.904211);

    h.state.locations.set_privacy("alice", PrivacyLevel::Approximate).await.unwrap();
    let view = h.state.locations.current_location("alice", "bob").await.unwrap();
    let coords = view.coordinates.unwrap();
    assert_eq!(coords.latitude, 39.9);
    assert_eq!(coords.longitude, 116.41);
    assert!(coords.altitude.is_none());

    h.state.locations.set_privacy("alice", PrivacyLevel::Hidden).await.unwrap();
    let view = h.state.locations.current_location("alice", "bob").await.unwrap();
    assert!(view.coordinates.is_none());
    assert!(view.sharing_active);
    assert_eq!(view.user_id, "alice");
}

#[tokio::test]
async fn peer_only_sees_samples_shared_with_common_group() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice", "bob"]);
    h.report("alice", BASE).await;

    // 停止共享之后的位置对 bob 不可见
    h.mem.directory.set_location_sharing("g1", false);
    h.report("alice", (10.0, 10.0)).await;

    let view = h.state.locations.current_location("alice", "bob").await.unwrap();
    assert_eq!(view.coordinates.unwrap().latitude, BASE.0);

    let own = h.state.locations.current_location("alice", "alice").await.unwrap();
    assert_eq!(own.coordinates.unwrap().latitude, 10.0);
}

#[tokio::test]
async fn missing_location_is_not_found() {
    let h = Harness::new();
    let err = h.state.locations.current_location("alice", "alice").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn group_locations_require_active_membership() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice", "bob"]);
    h.mem.directory.set_member("g1", "carol", MemberStatus::Inactive);

    let err = h.state.locations.group_locations("g1", "carol").await.unwrap_err();
    assert!(matches!(err, AppError::Permission(_)));

    let err = h.state.locations.group_locations("nope", "alice").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn group_locations_apply_each_members_privacy() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice", "bob", "carol", "dave"]);
    h.report("alice", (1.2345, 2.3456)).await;
    h.report("bob", (3.4567, 4.5678)).await;
    h.report("carol", (5.0, 6.0)).await;
    // dave 从未上报
    h.state.locations.set_privacy("bob", PrivacyLevel::Approximate).await.unwrap();
    h.state.locations.set_privacy("carol", PrivacyLevel::Hidden).await.unwrap();

    let mut views = h.state.locations.group_locations("g1", "alice").await.unwrap();
    views.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    let users: Vec<&str> = views.iter().map(|v| v.user_id.as_str()).collect();
    assert_eq!(users, ["alice", "bob", "carol"]);

    assert_eq!(views[0].coordinates.unwrap().latitude, 1.2345);
    assert_eq!(views[1].coordinates.unwrap().latitude, 3.46);
    assert!(views[2].coordinates.is_none());
}

#[tokio::test]
async fn group_locations_skip_inactive_members() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice", "bob"]);
    h.report("bob", BASE).await;
    h.mem.directory.set_member("g1", "bob", MemberStatus::Muted);

    let views = h.state.locations.group_locations("g1", "alice").await.unwrap();
    assert!(views.is_empty());
}

#[tokio::test]
async fn history_is_ascending_and_bounded() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice", "bob"]);
    for i in 0..3_i32 {
        h.report("alice", (BASE.0 + f64::from(i) * 0.001, BASE.1)).await;
    }

    let end = Utc::now() + Duration::seconds(1);
    let start = end - Duration::hours(1);
    let history = h
        .state
        .locations
        .location_history("alice", start, end, None, "bob")
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let err = h
        .state
        .locations
        .location_history("alice", end, start, None, "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let empty = h
        .state
        .locations
        .location_history("alice", start - Duration::hours(5), start, None, "alice")
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn history_group_filter_must_be_shared() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice", "bob"]);
    h.group("g2", "Work", true, &["alice"]);
    h.report("alice", BASE).await;

    let end = Utc::now() + Duration::seconds(1);
    let start = end - Duration::hours(24);

    let in_g1 = h
        .state
        .locations
        .location_history("alice", start, end, Some("g1"), "bob")
        .await
        .unwrap();
    assert_eq!(in_g1.len(), 1);

    let err = h
        .state
        .locations
        .location_history("alice", start, end, Some("g2"), "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Permission(_)));

    let err = h
        .state
        .locations
        .location_history("alice", start, end, None, "stranger")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Permission(_)));
}

#[tokio::test]
async fn history_uses_current_privacy_level() {
    let h = Harness::new();
    h.group("g1", "Family", true, &["alice", "bob"]);
    h.report("alice", BASE).await;
    h.state.locations.set_privacy("alice", PrivacyLevel::Hidden).await.unwrap();

    let end = Utc::now() + Duration::seconds(1);
    let history = h
        .state
        .locations
        .location_history("alice", end - Duration::hours(1), end, None, "bob")
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].coordinates.is_none());
}
