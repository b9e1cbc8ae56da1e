//! Error types for `haven-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{incident::IncidentStatus, sla::InteractionStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("incident not found: {0}")]
  IncidentNotFound(Uuid),

  #[error("invalid incident transition: {from:?} -> {to:?}")]
  InvalidTransition {
    from: IncidentStatus,
    to:   IncidentStatus,
  },

  #[error("incident {0} is closed; no further live writes accepted")]
  IncidentClosed(Uuid),

  #[error("interaction not found: {0}")]
  InteractionNotFound(Uuid),

  #[error("invalid interaction transition: {from:?} -> {to:?}")]
  InvalidInteractionTransition {
    from: InteractionStatus,
    to:   InteractionStatus,
  },

  #[error("policy not found: {0}")]
  PolicyNotFound(Uuid),

  #[error("place not found: {0}")]
  PlaceNotFound(Uuid),

  #[error("place name must not be empty")]
  EmptyPlaceName,

  #[error("place radius {0} m outside [{min}, {max}]", min = crate::place::MIN_RADIUS_M, max = crate::place::MAX_RADIUS_M)]
  RadiusOutOfRange(f64),

  #[error("latitude {0} outside [-90, 90]")]
  LatitudeOutOfRange(f64),

  #[error("longitude {0} outside [-180, 180]")]
  LongitudeOutOfRange(f64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
