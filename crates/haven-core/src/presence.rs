//! Continuous presence — the single mutable "current location" row per user.
//!
//! Unlike incident location samples this is not a history: every update
//! overwrites the row (last write wins). Status is `Online` whenever an
//! update is in flight and `Offline` only on explicit stop, so consumers must
//! treat `last_seen` staleness, not status, as the true liveness signal.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
  Online,
  Idle,
  Offline,
}

// ─── LiveLocation ────────────────────────────────────────────────────────────

/// Exactly one row per user; upserted on every position sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveLocation {
  pub user_id:         Uuid,
  pub family_group_id: Option<Uuid>,
  pub latitude:        f64,
  pub longitude:       f64,
  pub accuracy_m:      f64,
  /// Degrees clockwise from north, when the device reports one.
  pub heading:         Option<f64>,
  /// Metres per second, when the device reports one.
  pub speed:           Option<f64>,
  /// Battery level 0–100, best-effort; absent when unavailable.
  pub battery_pct:     Option<f64>,
  pub status:          PresenceStatus,
  pub last_seen:       DateTime<Utc>,
}

impl LiveLocation {
  /// Liveness judgement: there is no ambient timeout flipping status to
  /// offline, so staleness of `last_seen` is the signal.
  pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
    now - self.last_seen > max_age
  }
}

/// Input to [`crate::store::SafetyStore::upsert_live_location`].
#[derive(Debug, Clone)]
pub struct PositionUpdate {
  pub user_id:         Uuid,
  pub family_group_id: Option<Uuid>,
  pub latitude:        f64,
  pub longitude:       f64,
  pub accuracy_m:      f64,
  pub heading:         Option<f64>,
  pub speed:           Option<f64>,
  pub battery_pct:     Option<f64>,
}
