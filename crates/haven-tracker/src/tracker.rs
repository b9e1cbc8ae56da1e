//! The tracking state machine and its background tasks.

use std::{
  sync::{Arc, Mutex, MutexGuard},
  time::Duration,
};

use chrono::{DateTime, Utc};
use haven_core::{
  presence::{LiveLocation, PositionUpdate},
  store::SafetyStore,
};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
  Error, Result,
  geo::{BatteryProbe, Geolocator, Position},
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TrackerConfig {
  /// Fallback poll cadence in case the device watch stalls.
  pub poll_interval: Duration,
  /// Bound on the initial (and manual-refresh) high-accuracy fix.
  pub fix_timeout:   Duration,
  /// Bound on each fallback poll fix; a miss does not end the session.
  pub watch_timeout: Duration,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      poll_interval: Duration::from_secs(15),
      fix_timeout:   Duration::from_secs(10),
      watch_timeout: Duration::from_secs(30),
    }
  }
}

// ─── State & metrics ─────────────────────────────────────────────────────────

/// The tracking lifecycle. All transitions are guarded; concurrent `start`
/// calls outside `Idle` are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
  Idle,
  Starting,
  Tracking,
  Stopping,
}

/// Running diagnostics. Exposed for observability, never used for control
/// flow.
#[derive(Debug, Clone, Default)]
pub struct TrackerMetrics {
  pub attempts:        u64,
  pub successes:       u64,
  pub last_success_at: Option<DateTime<Utc>>,
  /// Running average accuracy over successful writes.
  pub avg_accuracy_m:  Option<f64>,
}

impl TrackerMetrics {
  pub fn success_rate(&self) -> Option<f64> {
    (self.attempts > 0).then(|| self.successes as f64 / self.attempts as f64)
  }

  fn record_attempt(&mut self) { self.attempts += 1; }

  fn record_success(&mut self, accuracy_m: f64, at: DateTime<Utc>) {
    self.successes += 1;
    self.last_success_at = Some(at);
    let prev = self.avg_accuracy_m.unwrap_or(accuracy_m);
    self.avg_accuracy_m =
      Some(prev + (accuracy_m - prev) / self.successes as f64);
  }
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

struct Inner<S, G, B> {
  store:           S,
  geo:             G,
  battery:         B,
  user_id:         Uuid,
  family_group_id: Option<Uuid>,
  config:          TrackerConfig,
  state:           Mutex<TrackerState>,
  metrics:         Mutex<TrackerMetrics>,
}

/// The Location Reporter. Owns the watch and fallback-poll tasks; shared
/// position state lives only in the store's live-location row.
pub struct Tracker<S, G, B> {
  inner: Arc<Inner<S, G, B>>,
  tasks: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().expect("tracker mutex poisoned")
}

impl<S, G, B> Tracker<S, G, B>
where
  S: SafetyStore + Clone + Send + Sync + 'static,
  G: Geolocator,
  B: BatteryProbe,
{
  pub fn new(
    store: S,
    geo: G,
    battery: B,
    user_id: Uuid,
    family_group_id: Option<Uuid>,
    config: TrackerConfig,
  ) -> Self {
    Self {
      inner: Arc::new(Inner {
        store,
        geo,
        battery,
        user_id,
        family_group_id,
        config,
        state: Mutex::new(TrackerState::Idle),
        metrics: Mutex::new(TrackerMetrics::default()),
      }),
      tasks: Mutex::new(Vec::new()),
    }
  }

  pub fn state(&self) -> TrackerState { *lock(&self.inner.state) }

  pub fn store(&self) -> &S { &self.inner.store }

  pub fn metrics(&self) -> TrackerMetrics {
    lock(&self.inner.metrics).clone()
  }

  /// Begin tracking: one immediate high-accuracy fix, then the continuous
  /// watch plus the periodic fallback poll.
  ///
  /// A no-op unless the tracker is `Idle` — the guard makes concurrent
  /// starts safe. Permission denial or a timeout on the immediate fix
  /// aborts the start and returns the tracker to `Idle`.
  pub async fn start(&self) -> Result<()> {
    {
      let mut state = lock(&self.inner.state);
      if *state != TrackerState::Idle {
        return Ok(());
      }
      *state = TrackerState::Starting;
    }

    let first = match self
      .inner
      .geo
      .current_position(true, self.inner.config.fix_timeout)
      .await
    {
      Ok(position) => position,
      Err(e) => {
        *lock(&self.inner.state) = TrackerState::Idle;
        return Err(Error::Geo(e));
      }
    };

    if let Err(e) = self.inner.write_position(first).await {
      *lock(&self.inner.state) = TrackerState::Idle;
      return Err(e);
    }

    let watch = tokio::spawn(watch_task(Arc::clone(&self.inner)));
    let poll = tokio::spawn(poll_task(Arc::clone(&self.inner)));
    lock(&self.tasks).extend([watch, poll]);

    *lock(&self.inner.state) = TrackerState::Tracking;
    Ok(())
  }

  /// Tear down the watch and the fallback poll. With `explicit = true`
  /// (user-initiated stop) the shared row is flipped offline exactly once;
  /// with `explicit = false` (component teardown) the shared status is left
  /// untouched so a transient unmount never falsely marks the user offline.
  pub async fn stop(&self, explicit: bool) -> Result<()> {
    {
      let mut state = lock(&self.inner.state);
      if !matches!(*state, TrackerState::Tracking | TrackerState::Starting) {
        return Ok(());
      }
      *state = TrackerState::Stopping;
    }

    for task in lock(&self.tasks).drain(..) {
      task.abort();
    }

    let result = if explicit {
      self
        .inner
        .store
        .set_offline(self.inner.user_id)
        .await
        .map(|_| ())
        .map_err(|e| Error::Store(Box::new(e)))
    } else {
      Ok(())
    };

    *lock(&self.inner.state) = TrackerState::Idle;
    result
  }

  /// Manual one-shot refresh through the same write path. User-initiated,
  /// so failures propagate instead of being swallowed.
  pub async fn refresh(&self) -> Result<LiveLocation> {
    let position = self
      .inner
      .geo
      .current_position(true, self.inner.config.fix_timeout)
      .await?;
    self.inner.write_position(position).await
  }
}

impl<S, G, B> Inner<S, G, B>
where
  S: SafetyStore + Clone + Send + Sync + 'static,
  G: Geolocator,
  B: BatteryProbe,
{
  /// The single write path both the watch and the poll converge on.
  /// Enriches the fix with best-effort battery level and upserts the
  /// live-location row (status comes back `Online`).
  async fn write_position(&self, position: Position) -> Result<LiveLocation> {
    lock(&self.metrics).record_attempt();

    let battery_pct = self.battery.level().await;
    let written = self
      .store
      .upsert_live_location(PositionUpdate {
        user_id: self.user_id,
        family_group_id: self.family_group_id,
        latitude: position.latitude,
        longitude: position.longitude,
        accuracy_m: position.accuracy_m,
        heading: position.heading,
        speed: position.speed,
        battery_pct,
      })
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;

    lock(&self.metrics).record_success(position.accuracy_m, Utc::now());
    Ok(written)
  }
}

// ─── Background tasks ────────────────────────────────────────────────────────
// Failures in both loops are swallowed at the loop boundary: logged and
// counted, never session-ending.

async fn watch_task<S, G, B>(inner: Arc<Inner<S, G, B>>)
where
  S: SafetyStore + Clone + Send + Sync + 'static,
  G: Geolocator,
  B: BatteryProbe,
{
  let mut rx = inner.geo.watch_positions();
  while let Some(item) = rx.recv().await {
    match item {
      Ok(position) => {
        if let Err(e) = inner.write_position(position).await {
          tracing::warn!(user = %inner.user_id, error = %e, "watch write failed");
        }
      }
      Err(e) => {
        tracing::warn!(user = %inner.user_id, error = %e, "watch fix failed");
      }
    }
  }
}

async fn poll_task<S, G, B>(inner: Arc<Inner<S, G, B>>)
where
  S: SafetyStore + Clone + Send + Sync + 'static,
  G: Geolocator,
  B: BatteryProbe,
{
  let mut interval = tokio::time::interval(inner.config.poll_interval);
  // The immediate tick was already covered by the start-up fix.
  interval.tick().await;

  loop {
    interval.tick().await;
    match inner
      .geo
      .current_position(false, inner.config.watch_timeout)
      .await
    {
      Ok(position) => {
        if let Err(e) = inner.write_position(position).await {
          tracing::warn!(user = %inner.user_id, error = %e, "poll write failed");
        }
      }
      Err(e) => {
        lock(&inner.metrics).record_attempt();
        tracing::warn!(user = %inner.user_id, error = %e, "poll fix failed");
      }
    }
  }
}
