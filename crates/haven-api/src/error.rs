//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("validation failed: {0}")]
  Validation(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Map a storage-layer error, surfacing the domain error buried in its
  /// source chain as the right status code instead of a blanket 500.
  pub fn from_store<E>(e: E) -> Self
  where E: std::error::Error + Send + Sync + 'static {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&e);
    while let Some(err) = source {
      if let Some(core) = err.downcast_ref::<haven_core::Error>() {
        return Self::from_core(core);
      }
      source = err.source();
    }
    ApiError::Store(Box::new(e))
  }

  fn from_core(e: &haven_core::Error) -> Self {
    use haven_core::Error as E;
    match e {
      E::IncidentNotFound(_)
      | E::InteractionNotFound(_)
      | E::PolicyNotFound(_)
      | E::PlaceNotFound(_) => ApiError::NotFound(e.to_string()),
      E::InvalidTransition { .. }
      | E::InvalidInteractionTransition { .. }
      | E::IncidentClosed(_) => ApiError::Conflict(e.to_string()),
      E::EmptyPlaceName
      | E::RadiusOutOfRange(_)
      | E::LatitudeOutOfRange(_)
      | E::LongitudeOutOfRange(_) => ApiError::Validation(e.to_string()),
      E::Serialization(_) => ApiError::BadRequest(e.to_string()),
    }
  }
}

impl From<haven_sla::Error> for ApiError {
  fn from(e: haven_sla::Error) -> Self {
    match e {
      haven_sla::Error::InteractionNotFound(id) => {
        ApiError::NotFound(format!("interaction {id} not found"))
      }
      haven_sla::Error::Store(inner) => {
        let mut source: Option<&(dyn std::error::Error + 'static)> =
          Some(inner.as_ref());
        while let Some(err) = source {
          if let Some(core) = err.downcast_ref::<haven_core::Error>() {
            return Self::from_core(core);
          }
          source = err.source();
        }
        ApiError::Store(inner)
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Validation(m) => {
        (StatusCode::UNPROCESSABLE_ENTITY, m.clone())
      }
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
