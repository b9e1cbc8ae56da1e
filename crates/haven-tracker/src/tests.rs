use std::{
  collections::VecDeque,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use haven_core::{presence::PresenceStatus, store::SafetyStore};
use haven_store_sqlite::SqliteStore;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
  BatteryProbe, GeoError, Geolocator, Position, Tracker, TrackerConfig,
  TrackerState,
};

// ─── Fakes ───────────────────────────────────────────────────────────────────

fn fix(latitude: f64, longitude: f64, accuracy_m: f64) -> Position {
  Position { latitude, longitude, accuracy_m, heading: None, speed: None }
}

/// Scripted geolocator: one-shot fixes pop from a queue (falling back to a
/// fixed default), watch positions come from whatever the test sends.
struct FakeGeo {
  script:   Mutex<VecDeque<Result<Position, GeoError>>>,
  watch_tx: Mutex<Option<mpsc::Sender<Result<Position, GeoError>>>>,
  calls:    AtomicUsize,
}

impl FakeGeo {
  fn new(script: impl IntoIterator<Item = Result<Position, GeoError>>) -> Self {
    Self {
      script:   Mutex::new(script.into_iter().collect()),
      watch_tx: Mutex::new(None),
      calls:    AtomicUsize::new(0),
    }
  }

  fn one_shot_calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

  fn watch_sender(&self) -> mpsc::Sender<Result<Position, GeoError>> {
    self
      .watch_tx
      .lock()
      .unwrap()
      .clone()
      .expect("watch_positions not yet called")
  }
}

impl Geolocator for Arc<FakeGeo> {
  async fn current_position(
    &self,
    _high_accuracy: bool,
    _timeout: Duration,
  ) -> Result<Position, GeoError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .script
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or(Ok(fix(51.5, -0.12, 25.0)))
  }

  fn watch_positions(&self) -> mpsc::Receiver<Result<Position, GeoError>> {
    let (tx, rx) = mpsc::channel(16);
    *self.watch_tx.lock().unwrap() = Some(tx);
    rx
  }
}

#[derive(Clone, Copy)]
struct FakeBattery(f64);

impl BatteryProbe for FakeBattery {
  async fn level(&self) -> Option<f64> { Some(self.0) }
}

async fn tracker_with(
  geo: Arc<FakeGeo>,
  user_id: Uuid,
) -> Tracker<SqliteStore, Arc<FakeGeo>, FakeBattery> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  // A long poll interval keeps the fallback loop out of the way.
  let config = TrackerConfig {
    poll_interval: Duration::from_secs(600),
    ..TrackerConfig::default()
  };
  Tracker::new(store, geo, FakeBattery(88.0), user_id, None, config)
}

async fn settle() { tokio::time::sleep(Duration::from_millis(50)).await; }

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_takes_an_immediate_fix() {
  let user = Uuid::new_v4();
  let geo = Arc::new(FakeGeo::new([Ok(fix(48.85, 2.35, 12.0))]));
  let tracker = tracker_with(Arc::clone(&geo), user).await;

  tracker.start().await.unwrap();
  assert_eq!(tracker.state(), TrackerState::Tracking);

  let row = tracker.store().live_location(user).await.unwrap().unwrap();
  assert_eq!(row.latitude, 48.85);
  assert_eq!(row.accuracy_m, 12.0);
  assert_eq!(row.battery_pct, Some(88.0));
  assert_eq!(row.status, PresenceStatus::Online);
}

#[tokio::test]
async fn second_start_is_a_no_op() {
  let geo = Arc::new(FakeGeo::new([]));
  let tracker = tracker_with(Arc::clone(&geo), Uuid::new_v4()).await;

  tracker.start().await.unwrap();
  tracker.start().await.unwrap();

  assert_eq!(tracker.state(), TrackerState::Tracking);
  assert_eq!(geo.one_shot_calls(), 1);
}

#[tokio::test]
async fn permission_denial_aborts_the_start() {
  let user = Uuid::new_v4();
  let geo = Arc::new(FakeGeo::new([Err(GeoError::PermissionDenied)]));
  let tracker = tracker_with(Arc::clone(&geo), user).await;

  let err = tracker.start().await.unwrap_err();
  assert!(matches!(err, crate::Error::Geo(GeoError::PermissionDenied)));
  assert_eq!(tracker.state(), TrackerState::Idle);
  assert!(tracker.store().live_location(user).await.unwrap().is_none());
}

#[tokio::test]
async fn watch_positions_reach_the_store() {
  let user = Uuid::new_v4();
  let geo = Arc::new(FakeGeo::new([Ok(fix(10.0, 10.0, 30.0))]));
  let tracker = tracker_with(Arc::clone(&geo), user).await;

  tracker.start().await.unwrap();
  settle().await;

  geo.watch_sender().send(Ok(fix(11.0, 11.0, 8.0))).await.unwrap();
  settle().await;

  let row = tracker.store().live_location(user).await.unwrap().unwrap();
  assert_eq!(row.latitude, 11.0);
  assert_eq!(row.accuracy_m, 8.0);
}

#[tokio::test]
async fn a_failed_watch_fix_does_not_end_the_session() {
  let user = Uuid::new_v4();
  let geo = Arc::new(FakeGeo::new([Ok(fix(10.0, 10.0, 30.0))]));
  let tracker = tracker_with(Arc::clone(&geo), user).await;

  tracker.start().await.unwrap();
  settle().await;

  let tx = geo.watch_sender();
  tx.send(Err(GeoError::Timeout)).await.unwrap();
  tx.send(Ok(fix(12.0, 12.0, 9.0))).await.unwrap();
  settle().await;

  assert_eq!(tracker.state(), TrackerState::Tracking);
  let row = tracker.store().live_location(user).await.unwrap().unwrap();
  assert_eq!(row.latitude, 12.0);
}

#[tokio::test]
async fn explicit_stop_flips_the_row_offline() {
  let user = Uuid::new_v4();
  let geo = Arc::new(FakeGeo::new([]));
  let tracker = tracker_with(Arc::clone(&geo), user).await;

  tracker.start().await.unwrap();
  tracker.stop(true).await.unwrap();

  assert_eq!(tracker.state(), TrackerState::Idle);
  let row = tracker.store().live_location(user).await.unwrap().unwrap();
  assert_eq!(row.status, PresenceStatus::Offline);
}

#[tokio::test]
async fn teardown_stop_leaves_the_shared_row_alone() {
  let user = Uuid::new_v4();
  let geo = Arc::new(FakeGeo::new([]));
  let tracker = tracker_with(Arc::clone(&geo), user).await;

  tracker.start().await.unwrap();
  tracker.stop(false).await.unwrap();

  assert_eq!(tracker.state(), TrackerState::Idle);
  let row = tracker.store().live_location(user).await.unwrap().unwrap();
  assert_eq!(row.status, PresenceStatus::Online);
}

#[tokio::test]
async fn stop_while_idle_is_a_no_op() {
  let user = Uuid::new_v4();
  let geo = Arc::new(FakeGeo::new([]));
  let tracker = tracker_with(Arc::clone(&geo), user).await;

  tracker.stop(true).await.unwrap();
  assert!(tracker.store().live_location(user).await.unwrap().is_none());
}

#[tokio::test]
async fn tracking_can_restart_after_an_explicit_stop() {
  let user = Uuid::new_v4();
  let geo = Arc::new(FakeGeo::new([
    Ok(fix(1.0, 1.0, 20.0)),
    Ok(fix(2.0, 2.0, 20.0)),
  ]));
  let tracker = tracker_with(Arc::clone(&geo), user).await;

  tracker.start().await.unwrap();
  tracker.stop(true).await.unwrap();
  tracker.start().await.unwrap();

  assert_eq!(tracker.state(), TrackerState::Tracking);
  let row = tracker.store().live_location(user).await.unwrap().unwrap();
  assert_eq!(row.latitude, 2.0);
  assert_eq!(row.status, PresenceStatus::Online);
}

#[tokio::test]
async fn refresh_propagates_fix_errors() {
  let geo = Arc::new(FakeGeo::new([Err(GeoError::Timeout)]));
  let tracker = tracker_with(Arc::clone(&geo), Uuid::new_v4()).await;

  let err = tracker.refresh().await.unwrap_err();
  assert!(matches!(err, crate::Error::Geo(GeoError::Timeout)));
}

#[tokio::test]
async fn refresh_works_without_a_running_session() {
  let user = Uuid::new_v4();
  let geo = Arc::new(FakeGeo::new([Ok(fix(3.0, 4.0, 5.0))]));
  let tracker = tracker_with(Arc::clone(&geo), user).await;

  let row = tracker.refresh().await.unwrap();
  assert_eq!(tracker.state(), TrackerState::Idle);
  assert_eq!(row.latitude, 3.0);
  assert_eq!(row.battery_pct, Some(88.0));
}

#[tokio::test]
async fn metrics_average_accuracy_over_successes() {
  let user = Uuid::new_v4();
  let geo = Arc::new(FakeGeo::new([
    Ok(fix(1.0, 1.0, 10.0)),
    Ok(fix(2.0, 2.0, 30.0)),
  ]));
  let tracker = tracker_with(Arc::clone(&geo), user).await;

  tracker.refresh().await.unwrap();
  tracker.refresh().await.unwrap();

  let metrics = tracker.metrics();
  assert_eq!(metrics.attempts, 2);
  assert_eq!(metrics.successes, 2);
  assert_eq!(metrics.avg_accuracy_m, Some(20.0));
  assert_eq!(metrics.success_rate(), Some(1.0));
  assert!(metrics.last_success_at.is_some());
}
