//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Incident metadata is stored
//! as compact JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use haven_core::{
  incident::{
    Acknowledgement, Incident, IncidentStatus, LocationSample, Priority,
  },
  place::Place,
  presence::{LiveLocation, PresenceStatus},
  sla::{
    BreachKind, InteractionStatus, SlaBreach, SlaPolicy, TrackedInteraction,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

pub fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Status enums ────────────────────────────────────────────────────────────

pub fn encode_incident_status(s: IncidentStatus) -> &'static str {
  match s {
    IncidentStatus::Active => "active",
    IncidentStatus::Acknowledged => "acknowledged",
    IncidentStatus::Resolved => "resolved",
    IncidentStatus::Canceled => "canceled",
  }
}

pub fn decode_incident_status(s: &str) -> Result<IncidentStatus> {
  match s {
    "active" => Ok(IncidentStatus::Active),
    "acknowledged" => Ok(IncidentStatus::Acknowledged),
    "resolved" => Ok(IncidentStatus::Resolved),
    "canceled" => Ok(IncidentStatus::Canceled),
    other => Err(Error::Decode(format!("unknown incident status: {other:?}"))),
  }
}

pub fn encode_priority(p: Priority) -> &'static str {
  match p {
    Priority::Critical => "critical",
    Priority::High => "high",
    Priority::Medium => "medium",
    Priority::Low => "low",
  }
}

pub fn decode_priority(s: &str) -> Result<Priority> {
  match s {
    "critical" => Ok(Priority::Critical),
    "high" => Ok(Priority::High),
    "medium" => Ok(Priority::Medium),
    "low" => Ok(Priority::Low),
    other => Err(Error::Decode(format!("unknown priority: {other:?}"))),
  }
}

pub fn encode_presence_status(s: PresenceStatus) -> &'static str {
  match s {
    PresenceStatus::Online => "online",
    PresenceStatus::Idle => "idle",
    PresenceStatus::Offline => "offline",
  }
}

pub fn decode_presence_status(s: &str) -> Result<PresenceStatus> {
  match s {
    "online" => Ok(PresenceStatus::Online),
    "idle" => Ok(PresenceStatus::Idle),
    "offline" => Ok(PresenceStatus::Offline),
    other => Err(Error::Decode(format!("unknown presence status: {other:?}"))),
  }
}

pub fn encode_interaction_status(s: InteractionStatus) -> &'static str {
  match s {
    InteractionStatus::Open => "open",
    InteractionStatus::Pending => "pending",
    InteractionStatus::Escalated => "escalated",
    InteractionStatus::Resolved => "resolved",
    InteractionStatus::Closed => "closed",
  }
}

pub fn decode_interaction_status(s: &str) -> Result<InteractionStatus> {
  match s {
    "open" => Ok(InteractionStatus::Open),
    "pending" => Ok(InteractionStatus::Pending),
    "escalated" => Ok(InteractionStatus::Escalated),
    "resolved" => Ok(InteractionStatus::Resolved),
    "closed" => Ok(InteractionStatus::Closed),
    other => {
      Err(Error::Decode(format!("unknown interaction status: {other:?}")))
    }
  }
}

pub fn encode_breach_kind(k: BreachKind) -> &'static str {
  match k {
    BreachKind::FirstResponse => "first_response",
    BreachKind::Resolution => "resolution",
  }
}

pub fn decode_breach_kind(s: &str) -> Result<BreachKind> {
  match s {
    "first_response" => Ok(BreachKind::FirstResponse),
    "resolution" => Ok(BreachKind::Resolution),
    other => Err(Error::Decode(format!("unknown breach kind: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `incidents` row.
pub struct RawIncident {
  pub incident_id:     String,
  pub user_id:         String,
  pub family_group_id: String,
  pub status:          String,
  pub priority:        String,
  pub address:         Option<String>,
  pub metadata:        String,
  pub created_at:      String,
}

impl RawIncident {
  pub fn into_incident(self) -> Result<Incident> {
    Ok(Incident {
      incident_id:     decode_uuid(&self.incident_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      family_group_id: decode_uuid(&self.family_group_id)?,
      status:          decode_incident_status(&self.status)?,
      priority:        decode_priority(&self.priority)?,
      address:         self.address,
      metadata:        serde_json::from_str(&self.metadata)?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawSample {
  pub sample_id:   String,
  pub incident_id: String,
  pub latitude:    f64,
  pub longitude:   f64,
  pub accuracy_m:  f64,
  pub created_at:  String,
}

impl RawSample {
  pub fn into_sample(self) -> Result<LocationSample> {
    Ok(LocationSample {
      sample_id:   decode_uuid(&self.sample_id)?,
      incident_id: decode_uuid(&self.incident_id)?,
      latitude:    self.latitude,
      longitude:   self.longitude,
      accuracy_m:  self.accuracy_m,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawAck {
  pub ack_id:          String,
  pub incident_id:     String,
  pub user_id:         String,
  pub message:         Option<String>,
  pub acknowledged_at: String,
}

impl RawAck {
  pub fn into_ack(self) -> Result<Acknowledgement> {
    Ok(Acknowledgement {
      ack_id:          decode_uuid(&self.ack_id)?,
      incident_id:     decode_uuid(&self.incident_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      message:         self.message,
      acknowledged_at: decode_dt(&self.acknowledged_at)?,
    })
  }
}

pub struct RawLiveLocation {
  pub user_id:         String,
  pub family_group_id: Option<String>,
  pub latitude:        f64,
  pub longitude:       f64,
  pub accuracy_m:      f64,
  pub heading:         Option<f64>,
  pub speed:           Option<f64>,
  pub battery_pct:     Option<f64>,
  pub status:          String,
  pub last_seen:       String,
}

impl RawLiveLocation {
  pub fn into_live(self) -> Result<LiveLocation> {
    Ok(LiveLocation {
      user_id:         decode_uuid(&self.user_id)?,
      family_group_id: decode_opt_uuid(self.family_group_id.as_deref())?,
      latitude:        self.latitude,
      longitude:       self.longitude,
      accuracy_m:      self.accuracy_m,
      heading:         self.heading,
      speed:           self.speed,
      battery_pct:     self.battery_pct,
      status:          decode_presence_status(&self.status)?,
      last_seen:       decode_dt(&self.last_seen)?,
    })
  }
}

pub struct RawPlace {
  pub place_id:        String,
  pub family_group_id: String,
  pub name:            String,
  pub latitude:        f64,
  pub longitude:       f64,
  pub radius_m:        f64,
  pub created_by:      String,
  pub created_at:      String,
}

impl RawPlace {
  pub fn into_place(self) -> Result<Place> {
    Ok(Place {
      place_id:        decode_uuid(&self.place_id)?,
      family_group_id: decode_uuid(&self.family_group_id)?,
      name:            self.name,
      latitude:        self.latitude,
      longitude:       self.longitude,
      radius_m:        self.radius_m,
      created_by:      decode_uuid(&self.created_by)?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawPolicy {
  pub policy_id:                    String,
  pub name:                         String,
  pub channel:                      Option<String>,
  pub priority:                     Option<i32>,
  pub first_response_minutes:       i64,
  pub resolution_minutes:           i64,
  pub escalation_enabled:           bool,
  pub escalation_threshold_minutes: i64,
  pub escalation_target:            Option<String>,
  pub business_hours_only:          bool,
  pub active:                       bool,
  pub created_at:                   String,
}

impl RawPolicy {
  pub fn into_policy(self) -> Result<SlaPolicy> {
    Ok(SlaPolicy {
      policy_id: decode_uuid(&self.policy_id)?,
      name: self.name,
      channel: self.channel,
      priority: self.priority,
      first_response_minutes: self.first_response_minutes,
      resolution_minutes: self.resolution_minutes,
      escalation_enabled: self.escalation_enabled,
      escalation_threshold_minutes: self.escalation_threshold_minutes,
      escalation_target: decode_opt_uuid(self.escalation_target.as_deref())?,
      business_hours_only: self.business_hours_only,
      active: self.active,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawInteraction {
  pub interaction_id:    String,
  pub channel:           String,
  pub priority:          i32,
  pub subject:           Option<String>,
  pub status:            String,
  pub assigned_to:       Option<String>,
  pub first_response_at: Option<String>,
  pub response_due_at:   Option<String>,
  pub created_at:        String,
}

impl RawInteraction {
  pub fn into_interaction(self) -> Result<TrackedInteraction> {
    Ok(TrackedInteraction {
      interaction_id:    decode_uuid(&self.interaction_id)?,
      channel:           self.channel,
      priority:          self.priority,
      subject:           self.subject,
      status:            decode_interaction_status(&self.status)?,
      assigned_to:       decode_opt_uuid(self.assigned_to.as_deref())?,
      first_response_at: decode_opt_dt(self.first_response_at.as_deref())?,
      response_due_at:   decode_opt_dt(self.response_due_at.as_deref())?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawBreach {
  pub breach_id:      String,
  pub interaction_id: String,
  pub policy_id:      String,
  pub kind:           String,
  pub target_minutes: i64,
  pub actual_minutes: i64,
  pub breached_at:    String,
  pub resolved_at:    Option<String>,
}

impl RawBreach {
  pub fn into_breach(self) -> Result<SlaBreach> {
    Ok(SlaBreach {
      breach_id:      decode_uuid(&self.breach_id)?,
      interaction_id: decode_uuid(&self.interaction_id)?,
      policy_id:      decode_uuid(&self.policy_id)?,
      kind:           decode_breach_kind(&self.kind)?,
      target_minutes: self.target_minutes,
      actual_minutes: self.actual_minutes,
      breached_at:    decode_dt(&self.breached_at)?,
      resolved_at:    decode_opt_dt(self.resolved_at.as_deref())?,
    })
  }
}
