//! Handlers for `/sla` endpoints — policies, tracked interactions, and the
//! escalation engine's RPC surface.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sla/policies` | |
//! | `POST` | `/sla/interactions` | |
//! | `GET`  | `/sla/interactions/:id/status` | `report: null` if no policy |
//! | `POST` | `/sla/interactions/:id/apply-policy` | Persists the deadline |
//! | `POST` | `/sla/interactions/:id/respond` | Records first response |
//! | `POST` | `/sla/interactions/:id/resolve` | Also clears open breaches |
//! | `GET`  | `/sla/breaches` | Unresolved, joined with interactions |
//! | `POST` | `/sla/sweep` | Evaluate everything open |
//! | `GET`  | `/sla/metrics?from=&to=` | RFC 3339 timestamps |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use haven_core::{
  sla::{NewInteraction, NewSlaPolicy, SlaPolicy, TrackedInteraction},
  store::SafetyStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

// ─── Policies & interactions ──────────────────────────────────────────────────

/// `POST /sla/policies` — body is a full [`NewSlaPolicy`].
pub async fn create_policy<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewSlaPolicy>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let policy: SlaPolicy = state
    .store
    .create_policy(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(policy)))
}

/// `POST /sla/interactions`
pub async fn create_interaction<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewInteraction>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let interaction: TrackedInteraction = state
    .store
    .create_interaction(body)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(interaction)))
}

// ─── Engine RPCs ──────────────────────────────────────────────────────────────

/// `GET /sla/interactions/:id/status` — evaluate now. The report is `null`
/// when no active policy matches the interaction.
pub async fn check_sla_status<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Option<haven_sla::SlaReport>>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = state.engine.check(id, Utc::now()).await?;
  Ok(Json(report))
}

/// `POST /sla/interactions/:id/apply-policy`
pub async fn apply_policy<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Option<haven_sla::AppliedPolicy>>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let applied = state.engine.apply_policy(id).await?;
  Ok(Json(applied))
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
  /// Defaults to now.
  pub at: Option<DateTime<Utc>>,
}

/// `POST /sla/interactions/:id/respond` — record the first outbound response.
pub async fn respond<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RespondBody>,
) -> Result<Json<TrackedInteraction>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let interaction = state
    .engine
    .record_response(id, body.at.unwrap_or_else(Utc::now))
    .await?;
  Ok(Json(interaction))
}

/// `POST /sla/interactions/:id/resolve` — terminal; clears open breaches.
pub async fn resolve<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<TrackedInteraction>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let interaction = state.engine.resolve(id, Utc::now()).await?;
  Ok(Json(interaction))
}

/// `GET /sla/breaches` — unresolved breach alerts.
pub async fn list_breach_alerts<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<haven_sla::BreachAlert>>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let alerts = state.engine.breach_alerts().await?;
  Ok(Json(alerts))
}

/// `POST /sla/sweep` — evaluate every open interaction immediately.
pub async fn sweep<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<haven_sla::SweepSummary>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let summary = state.engine.sweep(Utc::now()).await?;
  Ok(Json(summary))
}

#[derive(Debug, Deserialize)]
pub struct MetricsParams {
  pub from: DateTime<Utc>,
  pub to:   DateTime<Utc>,
}

/// `GET /sla/metrics?from=<rfc3339>&to=<rfc3339>`
pub async fn metrics<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<MetricsParams>,
) -> Result<Json<haven_sla::ComplianceReport>, ApiError>
where
  S: SafetyStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let report = state.engine.metrics(params.from, params.to).await?;
  Ok(Json(report))
}
