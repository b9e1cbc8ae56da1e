//! Named circular geofences scoped to a family group.
//!
//! Pure data consumed by notification logic. Automatic "is user inside"
//! evaluation is a declared extension point — [`Place::contains`] is provided
//! for external consumers, nothing in the core calls it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Inclusive radius bounds in metres.
pub const MIN_RADIUS_M: f64 = 50.0;
pub const MAX_RADIUS_M: f64 = 1000.0;

/// Mean Earth radius in metres, for the haversine distance.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ─── Place ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
  pub place_id:        Uuid,
  pub family_group_id: Uuid,
  pub name:            String,
  pub latitude:        f64,
  pub longitude:       f64,
  pub radius_m:        f64,
  pub created_by:      Uuid,
  pub created_at:      DateTime<Utc>,
}

impl Place {
  /// Haversine point-in-circle test. Extension point for geofence-triggered
  /// notifications; not evaluated automatically by the core.
  pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
    haversine_m(self.latitude, self.longitude, latitude, longitude)
      <= self.radius_m
  }
}

/// Great-circle distance in metres between two WGS84 coordinates.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
  let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
  let d_phi = (lat2 - lat1).to_radians();
  let d_lambda = (lon2 - lon1).to_radians();

  let a = (d_phi / 2.0).sin().powi(2)
    + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

// ─── NewPlace ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::SafetyStore::create_place`]. Validated before any
/// write; a rejected place persists nothing.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPlace {
  pub family_group_id: Uuid,
  pub name:            String,
  pub latitude:        f64,
  pub longitude:       f64,
  pub radius_m:        f64,
  pub created_by:      Uuid,
}

impl NewPlace {
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::EmptyPlaceName);
    }
    if !(MIN_RADIUS_M..=MAX_RADIUS_M).contains(&self.radius_m) {
      return Err(Error::RadiusOutOfRange(self.radius_m));
    }
    if !(-90.0..=90.0).contains(&self.latitude) {
      return Err(Error::LatitudeOutOfRange(self.latitude));
    }
    if !(-180.0..=180.0).contains(&self.longitude) {
      return Err(Error::LongitudeOutOfRange(self.longitude));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn place(radius_m: f64) -> NewPlace {
    NewPlace {
      family_group_id: Uuid::new_v4(),
      name:            "Home".into(),
      latitude:        51.5,
      longitude:       -0.12,
      radius_m,
      created_by:      Uuid::new_v4(),
    }
  }

  #[test]
  fn radius_boundaries() {
    assert!(matches!(
      place(49.0).validate(),
      Err(Error::RadiusOutOfRange(_))
    ));
    assert!(place(50.0).validate().is_ok());
    assert!(place(1000.0).validate().is_ok());
    assert!(matches!(
      place(1001.0).validate(),
      Err(Error::RadiusOutOfRange(_))
    ));
  }

  #[test]
  fn coordinates_out_of_range_rejected() {
    let mut p = place(100.0);
    p.latitude = 90.5;
    assert!(matches!(p.validate(), Err(Error::LatitudeOutOfRange(_))));

    let mut p = place(100.0);
    p.longitude = -180.5;
    assert!(matches!(p.validate(), Err(Error::LongitudeOutOfRange(_))));
  }

  #[test]
  fn empty_name_rejected() {
    let mut p = place(100.0);
    p.name = "  ".into();
    assert!(matches!(p.validate(), Err(Error::EmptyPlaceName)));
  }

  #[test]
  fn contains_uses_haversine_distance() {
    let p = Place {
      place_id:        Uuid::new_v4(),
      family_group_id: Uuid::new_v4(),
      name:            "School".into(),
      latitude:        51.5,
      longitude:       -0.12,
      radius_m:        200.0,
      created_by:      Uuid::new_v4(),
      created_at:      Utc::now(),
    };
    // ~111 m per 0.001 degree of latitude.
    assert!(p.contains(51.501, -0.12));
    assert!(!p.contains(51.51, -0.12));
  }
}
