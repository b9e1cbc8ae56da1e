//! Location Reporter — samples device geolocation and maintains the shared
//! per-user live-location row.
//!
//! The reporter is an explicit finite-state machine rather than a pile of
//! mutable flags: `start` is reentrancy-guarded, `stop` distinguishes an
//! explicit user stop (which flips the shared row offline) from component
//! teardown (which only tears down local tasks), and both the continuous
//! watch and the periodic fallback poll converge on one idempotent upsert
//! path.

pub mod error;
pub mod geo;
pub mod tracker;

pub use error::{Error, Result};
pub use geo::{BatteryProbe, GeoError, Geolocator, NoBattery, Position};
pub use tracker::{Tracker, TrackerConfig, TrackerMetrics, TrackerState};

#[cfg(test)]
mod tests;
