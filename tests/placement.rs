//! Placement Integration Tests
//!
//! Drives the placement loop end to end: a synced model is loaded through
//! the caching loader and positioned from a stream of tracker events.

use std::sync::Arc;
use std::time::Duration;

use overlaykit::adapters::{AnchorUpdate, CachingLoader, HeadlessLoader, MarkerBoard};
use overlaykit::config::SyncSettings;
use overlaykit::core::{PlacementActor, PlacementEngine, PlacementHandle};
use overlaykit::domain::{PlacementState, Vec3};
use overlaykit::library::ContentCache;
use tempfile::TempDir;

async fn synced_model(temp: &TempDir) -> std::path::PathBuf {
    let source = temp.path().join("source");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("heart.usdz"), b"usdz bytes").unwrap();

    let cache = ContentCache::open(temp.path().join("home"), SyncSettings::default())
        .await
        .unwrap();
    let records = cache.sync(&source).await.unwrap();
    cache.resolve_local_path(&records[0])
}

fn spawn() -> PlacementHandle {
    let loader = CachingLoader::new(HeadlessLoader, 4);
    let (handle, _task) = PlacementActor::spawn(PlacementEngine::default(), Arc::new(loader));
    handle
}

async fn wait_for(handle: &PlacementHandle, state: PlacementState) {
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.state == state))
        .await
        .expect("timed out waiting for placement state")
        .unwrap();
}

fn added(marker: &str, position: Vec3) -> AnchorUpdate {
    AnchorUpdate::Added {
        marker: marker.to_string(),
        position,
    }
}

#[tokio::test]
async fn test_model_appears_after_third_marker() {
    let temp = TempDir::new().unwrap();
    let model = synced_model(&temp).await;
    let handle = spawn();

    handle.load_model(&model).await.unwrap();
    wait_for(&handle, PlacementState::WaitingForAnchors).await;

    let mut board = MarkerBoard::new();
    let events = [
        added("MarkerA", Vec3::new(0.0, 0.0, 0.0)),
        added("MarkerB", Vec3::new(0.0, 0.12, 0.0)),
    ];
    for event in events {
        handle.markers_updated(board.apply(event).clone()).await.unwrap();
    }
    handle.flush().await.unwrap();
    assert_eq!(handle.snapshot().state, PlacementState::WaitingForAnchors);
    assert!(!handle.snapshot().visible);

    let sample = board.apply(added("MarkerC", Vec3::new(0.0, 0.0, 0.12))).clone();
    handle.markers_updated(sample).await.unwrap();
    handle.flush().await.unwrap();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, PlacementState::PoseApplied);
    assert!(snapshot.visible);
    let pose = snapshot.last_pose.unwrap();
    assert!(pose.position.distance(Vec3::new(0.0, 0.04, 0.04)) < 1e-5);
}

#[tokio::test]
async fn test_jitter_ignored_until_reposition() {
    let temp = TempDir::new().unwrap();
    let model = synced_model(&temp).await;
    let handle = spawn();

    handle.load_model(&model).await.unwrap();
    wait_for(&handle, PlacementState::WaitingForAnchors).await;

    let mut board = MarkerBoard::new();
    board.apply(added("MarkerA", Vec3::new(0.0, 0.0, 0.0)));
    board.apply(added("MarkerB", Vec3::new(0.0, 0.12, 0.0)));
    let sample = board.apply(added("MarkerC", Vec3::new(0.0, 0.0, 0.12))).clone();
    handle.markers_updated(sample).await.unwrap();
    handle.flush().await.unwrap();
    let settled = handle.snapshot().last_pose;

    // Tracker jitter after placement
    let jittered = board
        .apply(AnchorUpdate::Updated {
            marker: "MarkerA".into(),
            position: Vec3::new(0.01, 0.0, 0.0),
        })
        .clone();
    handle.markers_updated(jittered.clone()).await.unwrap();
    handle.flush().await.unwrap();
    assert_eq!(handle.snapshot().last_pose, settled);

    // Reposition is ordered before the next update it gates
    handle.request_reposition().await.unwrap();
    handle.markers_updated(jittered).await.unwrap();
    handle.flush().await.unwrap();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, PlacementState::PoseApplied);
    assert_ne!(snapshot.last_pose, settled);
}

#[tokio::test]
async fn test_lost_marker_does_not_hide_placed_model() {
    let temp = TempDir::new().unwrap();
    let model = synced_model(&temp).await;
    let handle = spawn();

    handle.load_model(&model).await.unwrap();
    wait_for(&handle, PlacementState::WaitingForAnchors).await;

    let mut board = MarkerBoard::new();
    board.apply(added("MarkerA", Vec3::new(0.0, 0.0, 0.0)));
    board.apply(added("MarkerB", Vec3::new(0.0, 0.12, 0.0)));
    let sample = board.apply(added("MarkerC", Vec3::new(0.0, 0.0, 0.12))).clone();
    handle.markers_updated(sample).await.unwrap();

    let lost = board
        .apply(AnchorUpdate::Removed {
            marker: "MarkerB".into(),
        })
        .clone();
    handle.markers_updated(lost).await.unwrap();
    handle.flush().await.unwrap();

    assert!(handle.snapshot().visible);
}

#[tokio::test]
async fn test_missing_model_file_surfaces_error() {
    let temp = TempDir::new().unwrap();
    let handle = spawn();

    let mut rx = handle.subscribe();
    handle
        .load_model(temp.path().join("nowhere.usdz"))
        .await
        .unwrap();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|s| s.last_error.is_some()),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();

    assert_eq!(snapshot.state, PlacementState::Idle);
    assert!(snapshot.last_error.unwrap().contains("nowhere.usdz"));
}

#[tokio::test]
async fn test_tracking_failure_is_reported_verbatim() {
    let handle = spawn();
    handle
        .tracking_failed("Reference images are missing")
        .await
        .unwrap();
    handle.flush().await.unwrap();

    assert_eq!(
        handle.snapshot().last_error.as_deref(),
        Some("Reference images are missing")
    );
}
