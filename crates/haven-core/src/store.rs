//! The `SafetyStore` trait — the persistence seam for the platform.
//!
//! Implemented by storage backends (e.g. `haven-store-sqlite`). Higher layers
//! (`haven-api`, `haven-sla`, `haven-tracker`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Write-path invariants the backend must uphold:
//! - incident and interaction status transitions are validated and terminal
//!   states are immutable (compare-and-set, not read-modify-write);
//! - location samples and acknowledgements are append-only;
//! - the live-location row is a per-user upsert with last-write-wins
//!   semantics, and `last_seen` never moves backwards;
//! - breach insertion is idempotent per (interaction, kind) while unresolved;
//! - escalation is a one-shot transition guarded on interaction status.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  incident::{
    Acknowledgement, Incident, IncidentStatus, LocationSample,
    NewAcknowledgement, NewIncident, NewLocationSample, Priority,
  },
  place::{NewPlace, Place},
  presence::{LiveLocation, PositionUpdate},
  sla::{
    InteractionStatus, NewBreach, NewInteraction, NewSlaPolicy, SlaBreach,
    SlaPolicy, TrackedInteraction,
  },
};

/// Abstraction over a Haven storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SafetyStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Incidents ─────────────────────────────────────────────────────────

  /// Create an `Active` incident together with its immediate first location
  /// sample; the two writes establish the emergency atomically.
  fn create_incident(
    &self,
    input: NewIncident,
  ) -> impl Future<Output = Result<(Incident, LocationSample), Self::Error>>
  + Send
  + '_;

  /// Retrieve an incident by id. Returns `None` if not found.
  fn incident(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Incident>, Self::Error>> + Send + '_;

  /// All incidents visible to one family group, newest first.
  fn incidents_by_family(
    &self,
    family_group_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Incident>, Self::Error>> + Send + '_;

  /// All open (`Active` or `Acknowledged`) incidents, oldest first — the
  /// operator-console queue.
  fn open_incidents(
    &self,
  ) -> impl Future<Output = Result<Vec<Incident>, Self::Error>> + Send + '_;

  /// Move an incident to `to`, validating against the status machine.
  /// Returns the updated row. Fails on unknown id or an illegal transition;
  /// a terminal incident never changes again.
  fn transition_incident(
    &self,
    id: Uuid,
    to: IncidentStatus,
  ) -> impl Future<Output = Result<Incident, Self::Error>> + Send + '_;

  /// Operator triage: reclassify an incident's priority.
  fn set_priority(
    &self,
    id: Uuid,
    priority: Priority,
  ) -> impl Future<Output = Result<Incident, Self::Error>> + Send + '_;

  /// Append an acknowledgement. Accepted only while the incident is open.
  /// Duplicates per responder are permitted by the data layer; callers
  /// suppress them via [`SafetyStore::has_acknowledged`].
  fn acknowledge(
    &self,
    input: NewAcknowledgement,
  ) -> impl Future<Output = Result<Acknowledgement, Self::Error>> + Send + '_;

  /// All acknowledgements for an incident, oldest first.
  fn acknowledgements(
    &self,
    incident_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Acknowledgement>, Self::Error>> + Send + '_;

  /// Whether `user_id` already has an acknowledgement row for the incident.
  fn has_acknowledged(
    &self,
    incident_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Append a location sample. Accepted only while the incident is open;
  /// historical samples remain queryable after closure.
  fn append_location(
    &self,
    input: NewLocationSample,
  ) -> impl Future<Output = Result<LocationSample, Self::Error>> + Send + '_;

  /// All samples for an incident, newest first (the head is the incident's
  /// current location).
  fn locations(
    &self,
    incident_id: Uuid,
  ) -> impl Future<Output = Result<Vec<LocationSample>, Self::Error>> + Send + '_;

  // ── Presence ──────────────────────────────────────────────────────────

  /// Overwrite the per-user live-location row, setting status `Online` and
  /// `last_seen` to the write time. Last write wins; a write that would move
  /// `last_seen` backwards is ignored and the current row returned.
  fn upsert_live_location(
    &self,
    update: PositionUpdate,
  ) -> impl Future<Output = Result<LiveLocation, Self::Error>> + Send + '_;

  /// Explicit stop: flip the user's row to `Offline`. Returns the updated
  /// row, or `None` if the user has never reported a position.
  fn set_offline(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<LiveLocation>, Self::Error>> + Send + '_;

  fn live_location(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<LiveLocation>, Self::Error>> + Send + '_;

  fn live_locations_by_family(
    &self,
    family_group_id: Uuid,
  ) -> impl Future<Output = Result<Vec<LiveLocation>, Self::Error>> + Send + '_;

  // ── Places ────────────────────────────────────────────────────────────

  /// Persist a validated geofence. Implementations must run
  /// [`NewPlace::validate`] and reject before any write.
  fn create_place(
    &self,
    input: NewPlace,
  ) -> impl Future<Output = Result<Place, Self::Error>> + Send + '_;

  fn places_by_family(
    &self,
    family_group_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Place>, Self::Error>> + Send + '_;

  fn delete_place(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── SLA policies ──────────────────────────────────────────────────────

  fn create_policy(
    &self,
    input: NewSlaPolicy,
  ) -> impl Future<Output = Result<SlaPolicy, Self::Error>> + Send + '_;

  /// All active policies in deterministic order (`created_at`, then id) —
  /// the order that breaks equal-specificity selection ties.
  fn active_policies(
    &self,
  ) -> impl Future<Output = Result<Vec<SlaPolicy>, Self::Error>> + Send + '_;

  // ── Tracked interactions ──────────────────────────────────────────────

  fn create_interaction(
    &self,
    input: NewInteraction,
  ) -> impl Future<Output = Result<TrackedInteraction, Self::Error>> + Send + '_;

  fn interaction(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<TrackedInteraction>, Self::Error>>
  + Send
  + '_;

  /// All interactions in a non-terminal status — the sweep population.
  fn open_interactions(
    &self,
  ) -> impl Future<Output = Result<Vec<TrackedInteraction>, Self::Error>>
  + Send
  + '_;

  /// Persist the computed "response due at" deadline.
  fn set_response_due(
    &self,
    id: Uuid,
    due_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Record the first outbound response time, if none is recorded yet.
  fn record_first_response(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// One-shot escalation: reassign to `target` and mark `Escalated`, but
  /// only if the interaction is not terminal, not already escalated, and has
  /// no first response. Returns whether the transition happened — `false`
  /// means a prior escalation already won and this call was a no-op.
  fn escalate_interaction(
    &self,
    id: Uuid,
    target: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn transition_interaction(
    &self,
    id: Uuid,
    to: InteractionStatus,
  ) -> impl Future<Output = Result<TrackedInteraction, Self::Error>> + Send + '_;

  // ── Breaches ──────────────────────────────────────────────────────────

  /// Idempotent insert: record the breach unless an unresolved breach of the
  /// same kind already exists for the interaction. Returns the new row, or
  /// `None` when the existing row made this a no-op.
  fn open_breach(
    &self,
    input: NewBreach,
  ) -> impl Future<Output = Result<Option<SlaBreach>, Self::Error>> + Send + '_;

  /// All unresolved breaches, newest first.
  fn unresolved_breaches(
    &self,
  ) -> impl Future<Output = Result<Vec<SlaBreach>, Self::Error>> + Send + '_;

  /// Close out every unresolved breach for an interaction (e.g. when it
  /// resolves). Returns how many rows were updated.
  fn resolve_breaches(
    &self,
    interaction_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Metrics reads ─────────────────────────────────────────────────────

  /// Interactions created inside `[from, to]`.
  fn interactions_between(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<TrackedInteraction>, Self::Error>>
  + Send
  + '_;

  /// Count of breaches recorded inside `[from, to]`.
  fn breaches_between(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
