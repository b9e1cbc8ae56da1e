//! Handlers for `/console` endpoints — the operator's triage surface.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/console/queue` | Open incidents, oldest first |
//! | `POST` | `/console/incidents/:id/acknowledge` | Take ownership |
//! | `POST` | `/console/incidents/:id/close` | Resolve |
//! | `POST` | `/console/incidents/:id/priority` | Triage |

use axum::{
  Json,
  extract::{Path, State},
};
use haven_core::{
  incident::{
    Acknowledgement, Incident, IncidentStatus, LocationSample,
    NewAcknowledgement, Priority,
  },
  store::SafetyStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, error::ApiError, incidents};

// ─── Queue ────────────────────────────────────────────────────────────────────

/// One open incident enriched for display.
#[derive(Debug, Serialize)]
pub struct QueueEntry {
  pub incident:              Incident,
  pub acknowledgement_count: usize,
  /// The most recent location sample, if any beyond the trigger fix exist.
  pub latest_location:       Option<LocationSample>,
  pub response_guidance:     &'static str,
}

/// `GET /console/queue` — every open incident, oldest first, with ack count,
/// latest position, and the priority's canned guidance.
pub async fn queue<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<QueueEntry>>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let open =
    state.store.open_incidents().await.map_err(ApiError::from_store)?;

  let mut entries = Vec::with_capacity(open.len());
  for incident in open {
    let acks = state
      .store
      .acknowledgements(incident.incident_id)
      .await
      .map_err(ApiError::from_store)?;
    let mut samples = state
      .store
      .locations(incident.incident_id)
      .await
      .map_err(ApiError::from_store)?;

    entries.push(QueueEntry {
      response_guidance:     incident.priority.response_guidance(),
      acknowledgement_count: acks.len(),
      latest_location:       if samples.is_empty() {
        None
      } else {
        Some(samples.remove(0))
      },
      incident,
    });
  }
  Ok(Json(entries))
}

// ─── Acknowledge ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AcknowledgeBody {
  pub user_id: Uuid,
  pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConsoleAck {
  pub incident:        Incident,
  pub acknowledgement: Acknowledgement,
}

/// `POST /console/incidents/:id/acknowledge` — the operator takes ownership:
/// records an acknowledgement row and moves an `Active` incident to
/// `Acknowledged`. 409 once the incident is closed.
pub async fn acknowledge<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AcknowledgeBody>,
) -> Result<Json<ConsoleAck>, ApiError>
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

  // Rejects closed incidents before any status change.
  let acknowledgement = state
    .store
    .acknowledge(NewAcknowledgement {
      incident_id: id,
      user_id:     body.user_id,
      message:     body.message,
    })
    .await
    .map_err(ApiError::from_store)?;

  let incident = if incident.status == IncidentStatus::Active {
    incidents::transition(&state, id, IncidentStatus::Acknowledged).await?
  } else {
    incident
  };

  Ok(Json(ConsoleAck { incident, acknowledgement }))
}

// ─── Close ────────────────────────────────────────────────────────────────────

/// `POST /console/incidents/:id/close` — operator resolution.
pub async fn close<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Incident>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  incidents::transition(&state, id, IncidentStatus::Resolved).await.map(Json)
}

// ─── Priority ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PriorityBody {
  pub priority: Priority,
}

/// `POST /console/incidents/:id/priority` — reclassify.
pub async fn priority<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<PriorityBody>,
) -> Result<Json<Incident>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let incident = state
    .store
    .set_priority(id, body.priority)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(incident))
}
