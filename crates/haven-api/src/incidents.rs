//! Handlers for `/incidents` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/incidents?family_group_id=` | Newest first |
//! | `POST` | `/incidents` | SOS trigger; writes the first sample too |
//! | `GET`  | `/incidents/:id` | 404 if not found |
//! | `POST` | `/incidents/:id/acknowledge` | Duplicate per user suppressed |
//! | `POST` | `/incidents/:id/resolve` | 409 once terminal |
//! | `POST` | `/incidents/:id/cancel` | 409 once terminal |
//! | `GET`  | `/incidents/:id/locations` | Newest first |
//! | `POST` | `/incidents/:id/locations` | 409 once the incident is closed |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use haven_core::{
  incident::{
    Incident, IncidentStatus, LocationSample, NewAcknowledgement, NewIncident,
    NewLocationSample, Priority,
  },
  store::SafetyStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub family_group_id: Uuid,
}

/// `GET /incidents?family_group_id=<uuid>`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Incident>>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let incidents = state
    .store
    .incidents_by_family(params.family_group_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(incidents))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub user_id:         Uuid,
  pub family_group_id: Uuid,
  pub latitude:        f64,
  pub longitude:       f64,
  pub accuracy_m:      f64,
  pub priority:        Option<Priority>,
  pub address:         Option<String>,
  pub metadata:        Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct CreatedIncident {
  pub incident:     Incident,
  pub first_sample: LocationSample,
}

/// `POST /incidents` — the SOS trigger. Defaults to `critical` priority.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let mut input = NewIncident::new(
    body.user_id,
    body.family_group_id,
    body.latitude,
    body.longitude,
    body.accuracy_m,
  );
  if let Some(priority) = body.priority {
    input.priority = priority;
  }
  input.address = body.address;
  if let Some(metadata) = body.metadata {
    input.metadata = metadata;
  }

  let (incident, first_sample) = state
    .store
    .create_incident(input)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(CreatedIncident { incident, first_sample })))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /incidents/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Incident>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let incident = state
    .store
    .incident(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("incident {id} not found")))?;
  Ok(Json(incident))
}

// ─── Acknowledge ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AcknowledgeBody {
  pub user_id: Uuid,
  pub message: Option<String>,
}

/// `POST /incidents/:id/acknowledge` — a family member's "seen it".
///
/// A repeat acknowledgement by the same user returns the existing row with
/// `200` instead of appending a duplicate.
pub async fn acknowledge<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AcknowledgeBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let already = state
    .store
    .has_acknowledged(id, body.user_id)
    .await
    .map_err(ApiError::from_store)?;
  if already {
    let existing = state
      .store
      .acknowledgements(id)
      .await
      .map_err(ApiError::from_store)?
      .into_iter()
      .find(|a| a.user_id == body.user_id)
      .ok_or_else(|| ApiError::NotFound(format!("incident {id} not found")))?;
    return Ok((StatusCode::OK, Json(existing)));
  }

  let ack = state
    .store
    .acknowledge(NewAcknowledgement {
      incident_id: id,
      user_id:     body.user_id,
      message:     body.message,
    })
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(ack)))
}

// ─── Transitions ──────────────────────────────────────────────────────────────

/// `POST /incidents/:id/resolve`
pub async fn resolve<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Incident>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  transition(&state, id, IncidentStatus::Resolved).await.map(Json)
}

/// `POST /incidents/:id/cancel` — false alarm.
pub async fn cancel<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Incident>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  transition(&state, id, IncidentStatus::Canceled).await.map(Json)
}

pub(crate) async fn transition<S>(
  state: &AppState<S>,
  id: Uuid,
  to: IncidentStatus,
) -> Result<Incident, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  state
    .store
    .transition_incident(id, to)
    .await
    .map_err(ApiError::from_store)
}

// ─── Locations ────────────────────────────────────────────────────────────────

/// `GET /incidents/:id/locations` — newest first; the head is the incident's
/// current position.
pub async fn locations<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<LocationSample>>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let samples =
    state.store.locations(id).await.map_err(ApiError::from_store)?;
  Ok(Json(samples))
}

#[derive(Debug, Deserialize)]
pub struct AppendLocationBody {
  pub latitude:   f64,
  pub longitude:  f64,
  pub accuracy_m: f64,
}

/// `POST /incidents/:id/locations`
pub async fn append_location<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AppendLocationBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let sample = state
    .store
    .append_location(NewLocationSample {
      incident_id: id,
      latitude:    body.latitude,
      longitude:   body.longitude,
      accuracy_m:  body.accuracy_m,
    })
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(sample)))
}
