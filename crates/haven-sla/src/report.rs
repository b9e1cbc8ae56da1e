//! Engine outputs, serialized as-is by the API layer.

use chrono::{DateTime, Utc};
use haven_core::sla::{CheckStatus, SlaBreach, SlaPolicy, TrackedInteraction};
use serde::Serialize;
use uuid::Uuid;

/// One target check (first-response or resolution) at a point in time.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SlaCheck {
  pub status:            CheckStatus,
  pub target_minutes:    i64,
  pub elapsed_minutes:   i64,
  /// Negative once the target is missed.
  pub remaining_minutes: i64,
}

/// Result of checking one interaction against its selected policy.
#[derive(Debug, Clone, Serialize)]
pub struct SlaReport {
  pub interaction_id: Uuid,
  pub policy:         SlaPolicy,
  /// Absent once a first response is recorded (nothing left to check).
  pub first_response: Option<SlaCheck>,
  /// Absent once the interaction is terminal.
  pub resolution:     Option<SlaCheck>,
  /// Whether this evaluation fired the one-shot escalation.
  pub escalated:      bool,
  /// Breach rows inserted by this evaluation (idempotent re-checks report 0).
  pub new_breaches:   usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedPolicy {
  pub policy:          SlaPolicy,
  pub response_due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepSummary {
  pub checked:      usize,
  pub new_breaches: usize,
}

/// An unresolved breach joined with its interaction for display.
#[derive(Debug, Clone, Serialize)]
pub struct BreachAlert {
  pub breach:      SlaBreach,
  /// `None` only if the interaction row has since disappeared.
  pub interaction: Option<TrackedInteraction>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ComplianceReport {
  pub total_interactions:         usize,
  pub total_breaches:             usize,
  pub compliance_rate_pct:        f64,
  /// Mean minutes to first response over interactions that have one; computed
  /// from the `first_response_at` column, not a per-response join.
  pub avg_first_response_minutes: Option<f64>,
}
