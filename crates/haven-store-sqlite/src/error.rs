//! Error type for `haven-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain-rule violations (unknown ids, illegal transitions, validation).
  #[error("core error: {0}")]
  Core(#[from] haven_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("stored value could not be decoded: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
