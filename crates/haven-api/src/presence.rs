//! Handlers for `/presence` endpoints — the live family map.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/presence?family_group_id=` | One row per sharing user |
//! | `PUT`  | `/presence/:user_id` | Last write wins |
//! | `POST` | `/presence/:user_id/stop` | Explicit stop; 404 if never seen |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use haven_core::{
  presence::{LiveLocation, PositionUpdate},
  store::SafetyStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub family_group_id: Uuid,
}

/// `GET /presence?family_group_id=<uuid>`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<LiveLocation>>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let rows = state
    .store
    .live_locations_by_family(params.family_group_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub family_group_id: Option<Uuid>,
  pub latitude:        f64,
  pub longitude:       f64,
  pub accuracy_m:      f64,
  pub heading:         Option<f64>,
  pub speed:           Option<f64>,
  pub battery_pct:     Option<f64>,
}

/// `PUT /presence/:user_id` — upsert the user's live-location row.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(user_id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<LiveLocation>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let row = state
    .store
    .upsert_live_location(PositionUpdate {
      user_id,
      family_group_id: body.family_group_id,
      latitude: body.latitude,
      longitude: body.longitude,
      accuracy_m: body.accuracy_m,
      heading: body.heading,
      speed: body.speed,
      battery_pct: body.battery_pct,
    })
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(row))
}

/// `POST /presence/:user_id/stop` — explicit sharing stop.
pub async fn stop<S>(
  State(state): State<AppState<S>>,
  Path(user_id): Path<Uuid>,
) -> Result<Json<LiveLocation>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let row = state
    .store
    .set_offline(user_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no live location for user {user_id}"))
    })?;
  Ok(Json(row))
}
