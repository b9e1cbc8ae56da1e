//! Change events — the row-level cues pushed through the realtime fan-out.
//!
//! An event is a cue to re-fetch or merge, never a complete delta: delivery
//! is at-least-once and ordering holds only per row in commit order.
//! Consumers are expected to re-query idempotently on every event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Tables ──────────────────────────────────────────────────────────────────

/// The logical tables a change can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
  Incidents,
  IncidentLocations,
  IncidentAcknowledgements,
  LiveLocations,
  Places,
  SlaBreaches,
}

impl Table {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Incidents => "incidents",
      Self::IncidentLocations => "incident_locations",
      Self::IncidentAcknowledgements => "incident_acknowledgements",
      Self::LiveLocations => "live_locations",
      Self::Places => "places",
      Self::SlaBreaches => "sla_breaches",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
  Insert,
  Update,
  Delete,
}

// ─── ChangeEvent ─────────────────────────────────────────────────────────────

/// A row-level change notification. Carries only routing identifiers, not the
/// row itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
  pub table:           Table,
  pub op:              ChangeOp,
  /// Primary key of the changed row (for `live_locations`, the user id).
  pub row_id:          Uuid,
  pub family_group_id: Option<Uuid>,
  pub incident_id:     Option<Uuid>,
  pub user_id:         Option<Uuid>,
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// Subscription predicate for [`ChangeEvent`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
  All,
  Table(Table),
  /// All changes visible to one family group.
  FamilyGroup(Uuid),
  /// Location samples and acknowledgements for one incident.
  Incident(Uuid),
}

impl EventFilter {
  pub fn matches(&self, event: &ChangeEvent) -> bool {
    match self {
      Self::All => true,
      Self::Table(table) => event.table == *table,
      Self::FamilyGroup(id) => event.family_group_id == Some(*id),
      Self::Incident(id) => {
        event.incident_id == Some(*id) || event.row_id == *id
      }
    }
  }
}

// ─── EventSink ───────────────────────────────────────────────────────────────

/// Where the store hands committed changes. Publishing is fire-and-forget:
/// a sink with no listeners must accept events silently.
pub trait EventSink: Send + Sync {
  fn publish(&self, event: ChangeEvent);
}

/// Sink that drops everything; for stores running without a fan-out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
  fn publish(&self, _event: ChangeEvent) {}
}

#[cfg(test)]
mod tests {
  use super::*;

  fn event(table: Table) -> ChangeEvent {
    ChangeEvent {
      table,
      op: ChangeOp::Insert,
      row_id: Uuid::new_v4(),
      family_group_id: None,
      incident_id: None,
      user_id: None,
    }
  }

  #[test]
  fn family_group_filter_matches_only_its_group() {
    let group = Uuid::new_v4();
    let mut e = event(Table::Incidents);
    e.family_group_id = Some(group);

    assert!(EventFilter::FamilyGroup(group).matches(&e));
    assert!(!EventFilter::FamilyGroup(Uuid::new_v4()).matches(&e));
    assert!(EventFilter::All.matches(&e));
  }

  #[test]
  fn incident_filter_matches_children_and_the_row_itself() {
    let incident = Uuid::new_v4();

    let mut sample = event(Table::IncidentLocations);
    sample.incident_id = Some(incident);
    assert!(EventFilter::Incident(incident).matches(&sample));

    let mut row = event(Table::Incidents);
    row.row_id = incident;
    assert!(EventFilter::Incident(incident).matches(&row));

    assert!(!EventFilter::Incident(Uuid::new_v4()).matches(&sample));
  }
}
