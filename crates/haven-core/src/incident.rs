//! Incident types — one record per SOS trigger.
//!
//! An incident owns two append-only child tables: location samples (the live
//! trail shown to family members while the emergency is active) and
//! acknowledgements (a family member signalling "I've seen this"). The
//! incident row itself only ever moves forward through its status machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state of an incident. `Active` and `Acknowledged` are open;
/// `Resolved` and `Canceled` are terminal and never change again.
///
/// `Acknowledged` is the operator-console sub-state held in the same status
/// column: someone has taken ownership but the emergency is still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
  Active,
  Acknowledged,
  Resolved,
  Canceled,
}

impl IncidentStatus {
  pub fn is_open(self) -> bool {
    matches!(self, Self::Active | Self::Acknowledged)
  }

  pub fn is_terminal(self) -> bool { !self.is_open() }

  /// Whether the status machine permits moving from `self` to `to`.
  /// Terminal states admit no outgoing transition.
  pub fn can_transition_to(self, to: IncidentStatus) -> bool {
    matches!(
      (self, to),
      (Self::Active, Self::Acknowledged)
        | (Self::Active | Self::Acknowledged, Self::Resolved | Self::Canceled)
    )
  }
}

// ─── Priority ────────────────────────────────────────────────────────────────

/// Operator triage classification. Purely visual today; the hook point for
/// SLA-policy selection once incidents migrate onto tracked interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Critical,
  High,
  Medium,
  Low,
}

impl Priority {
  /// Canned response-time guidance shown to operators. Instructions, not
  /// machine-enforced targets.
  pub fn response_guidance(self) -> &'static str {
    match self {
      Self::Critical => "act within 2 minutes; dispatch immediately",
      Self::High => "act within 5 minutes; contact the family",
      Self::Medium => "act within 15 minutes",
      Self::Low => "review within the hour",
    }
  }
}

// ─── Incident ────────────────────────────────────────────────────────────────

/// One SOS/emergency record. Mutated only through status transitions and
/// priority triage; everything else is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
  pub incident_id:     Uuid,
  /// The user whose SOS trigger created this incident.
  pub user_id:         Uuid,
  pub family_group_id: Uuid,
  pub status:          IncidentStatus,
  pub priority:        Priority,
  /// Reverse-geocoded text for the trigger position, when available.
  pub address:         Option<String>,
  /// Free-form metadata, e.g. the triggering user's phone number.
  pub metadata:        serde_json::Value,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::SafetyStore::create_incident`]. Creation always
/// writes the incident row and an immediate first location sample together.
#[derive(Debug, Clone)]
pub struct NewIncident {
  pub user_id:         Uuid,
  pub family_group_id: Uuid,
  pub priority:        Priority,
  pub address:         Option<String>,
  pub metadata:        serde_json::Value,
  pub latitude:        f64,
  pub longitude:       f64,
  pub accuracy_m:      f64,
}

impl NewIncident {
  pub fn new(
    user_id: Uuid,
    family_group_id: Uuid,
    latitude: f64,
    longitude: f64,
    accuracy_m: f64,
  ) -> Self {
    Self {
      user_id,
      family_group_id,
      priority: Priority::Critical,
      address: None,
      metadata: serde_json::Value::Null,
      latitude,
      longitude,
      accuracy_m,
    }
  }
}

// ─── Location samples ────────────────────────────────────────────────────────

/// An immutable position fix scoped to an incident. The "current" location of
/// an incident is the most recent sample by `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSample {
  pub sample_id:   Uuid,
  pub incident_id: Uuid,
  pub latitude:    f64,
  pub longitude:   f64,
  pub accuracy_m:  f64,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::SafetyStore::append_location`]. Accepted only
/// while the incident is open.
#[derive(Debug, Clone)]
pub struct NewLocationSample {
  pub incident_id: Uuid,
  pub latitude:    f64,
  pub longitude:   f64,
  pub accuracy_m:  f64,
}

// ─── Acknowledgements ────────────────────────────────────────────────────────

/// A family member's "seen it" record. Append-only; the data layer does not
/// forbid a responder acknowledging twice — callers suppress re-submission
/// via [`crate::store::SafetyStore::has_acknowledged`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acknowledgement {
  pub ack_id:          Uuid,
  pub incident_id:     Uuid,
  pub user_id:         Uuid,
  pub message:         Option<String>,
  pub acknowledged_at: DateTime<Utc>,
}

/// Input to [`crate::store::SafetyStore::acknowledge`].
#[derive(Debug, Clone)]
pub struct NewAcknowledgement {
  pub incident_id: Uuid,
  pub user_id:     Uuid,
  pub message:     Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn terminal_states_admit_no_transition() {
    for from in [IncidentStatus::Resolved, IncidentStatus::Canceled] {
      for to in [
        IncidentStatus::Active,
        IncidentStatus::Acknowledged,
        IncidentStatus::Resolved,
        IncidentStatus::Canceled,
      ] {
        assert!(!from.can_transition_to(to), "{from:?} -> {to:?}");
      }
    }
  }

  #[test]
  fn open_states_move_forward_only() {
    use IncidentStatus::*;
    assert!(Active.can_transition_to(Acknowledged));
    assert!(Active.can_transition_to(Resolved));
    assert!(Active.can_transition_to(Canceled));
    assert!(Acknowledged.can_transition_to(Resolved));
    assert!(Acknowledged.can_transition_to(Canceled));
    assert!(!Acknowledged.can_transition_to(Active));
    assert!(!Active.can_transition_to(Active));
  }
}
