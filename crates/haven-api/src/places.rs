//! Handlers for `/places` endpoints — named geofenced circles.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/places?family_group_id=` | |
//! | `POST` | `/places` | 422 on validation failure, before any write |
//! | `DELETE` | `/places/:id` | 204 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use haven_core::{
  place::{NewPlace, Place},
  store::SafetyStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub family_group_id: Uuid,
}

/// `GET /places?family_group_id=<uuid>`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Place>>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let places = state
    .store
    .places_by_family(params.family_group_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(places))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub family_group_id: Uuid,
  pub name:            String,
  pub latitude:        f64,
  pub longitude:       f64,
  pub radius_m:        f64,
  pub created_by:      Uuid,
}

/// `POST /places`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let place = state
    .store
    .create_place(NewPlace {
      family_group_id: body.family_group_id,
      name:            body.name,
      latitude:        body.latitude,
      longitude:       body.longitude,
      radius_m:        body.radius_m,
      created_by:      body.created_by,
    })
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(place)))
}

/// `DELETE /places/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  state.store.delete_place(id).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
