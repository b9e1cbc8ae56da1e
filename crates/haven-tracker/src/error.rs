//! Error type for `haven-tracker`.

use thiserror::Error;

use crate::geo::GeoError;

#[derive(Debug, Error)]
pub enum Error {
  /// Permission/consent and acquisition failures; surfaced to the user,
  /// never retried automatically.
  #[error("geolocation error: {0}")]
  Geo(#[from] GeoError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
