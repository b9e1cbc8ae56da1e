//! Device-side source traits: geolocation and battery.
//!
//! Platform integrations implement these; the tracker only sees positions.

use std::{future::Future, time::Duration};

use thiserror::Error;
use tokio::sync::mpsc;

/// A single position fix as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
  pub latitude:   f64,
  pub longitude:  f64,
  pub accuracy_m: f64,
  pub heading:    Option<f64>,
  pub speed:      Option<f64>,
}

#[derive(Debug, Clone, Error)]
pub enum GeoError {
  /// The user denied location access. Aborts tracking; no automatic retry.
  #[error("geolocation permission denied")]
  PermissionDenied,

  #[error("timed out waiting for a position fix")]
  Timeout,

  #[error("position unavailable: {0}")]
  Unavailable(String),
}

/// Source of device position fixes.
pub trait Geolocator: Send + Sync + 'static {
  /// One-shot fix, bounded by `timeout`.
  fn current_position(
    &self,
    high_accuracy: bool,
    timeout: Duration,
  ) -> impl Future<Output = Result<Position, GeoError>> + Send + '_;

  /// Continuous watch: the receiver yields one item per device-reported
  /// movement. Dropping the receiver ends the watch.
  fn watch_positions(&self) -> mpsc::Receiver<Result<Position, GeoError>>;
}

/// Best-effort battery level, 0–100. `None` when the platform offers none.
pub trait BatteryProbe: Send + Sync + 'static {
  fn level(&self) -> impl Future<Output = Option<f64>> + Send + '_;
}

/// Probe for platforms without a battery API.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBattery;

impl BatteryProbe for NoBattery {
  async fn level(&self) -> Option<f64> { None }
}
