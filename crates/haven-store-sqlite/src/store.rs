//! [`SqliteStore`] — the SQLite implementation of [`SafetyStore`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use haven_core::{
  event::{ChangeEvent, ChangeOp, EventSink, NullSink, Table},
  incident::{
    Acknowledgement, Incident, IncidentStatus, LocationSample,
    NewAcknowledgement, NewIncident, NewLocationSample, Priority,
  },
  place::{NewPlace, Place},
  presence::{LiveLocation, PositionUpdate, PresenceStatus},
  sla::{
    InteractionStatus, NewBreach, NewInteraction, NewSlaPolicy, SlaBreach,
    SlaPolicy, TrackedInteraction,
  },
  store::SafetyStore,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  encode::{
    RawAck, RawBreach, RawIncident, RawInteraction, RawLiveLocation, RawPlace,
    RawPolicy, RawSample, encode_breach_kind, encode_dt,
    encode_incident_status, encode_interaction_status, encode_priority,
    encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Row mappers ─────────────────────────────────────────────────────────────
// One mapper per table, shared by every query over it. Column order must
// match the SELECT lists below.

const INCIDENT_COLS: &str = "incident_id, user_id, family_group_id, status, \
                             priority, address, metadata, created_at";

fn incident_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawIncident> {
  Ok(RawIncident {
    incident_id:     row.get(0)?,
    user_id:         row.get(1)?,
    family_group_id: row.get(2)?,
    status:          row.get(3)?,
    priority:        row.get(4)?,
    address:         row.get(5)?,
    metadata:        row.get(6)?,
    created_at:      row.get(7)?,
  })
}

const SAMPLE_COLS: &str =
  "sample_id, incident_id, latitude, longitude, accuracy_m, created_at";

fn sample_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSample> {
  Ok(RawSample {
    sample_id:   row.get(0)?,
    incident_id: row.get(1)?,
    latitude:    row.get(2)?,
    longitude:   row.get(3)?,
    accuracy_m:  row.get(4)?,
    created_at:  row.get(5)?,
  })
}

const ACK_COLS: &str =
  "ack_id, incident_id, user_id, message, acknowledged_at";

fn ack_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAck> {
  Ok(RawAck {
    ack_id:          row.get(0)?,
    incident_id:     row.get(1)?,
    user_id:         row.get(2)?,
    message:         row.get(3)?,
    acknowledged_at: row.get(4)?,
  })
}

const LIVE_COLS: &str = "user_id, family_group_id, latitude, longitude, \
                         accuracy_m, heading, speed, battery_pct, status, \
                         last_seen";

fn live_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawLiveLocation> {
  Ok(RawLiveLocation {
    user_id:         row.get(0)?,
    family_group_id: row.get(1)?,
    latitude:        row.get(2)?,
    longitude:       row.get(3)?,
    accuracy_m:      row.get(4)?,
    heading:         row.get(5)?,
    speed:           row.get(6)?,
    battery_pct:     row.get(7)?,
    status:          row.get(8)?,
    last_seen:       row.get(9)?,
  })
}

const PLACE_COLS: &str = "place_id, family_group_id, name, latitude, \
                          longitude, radius_m, created_by, created_at";

fn place_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPlace> {
  Ok(RawPlace {
    place_id:        row.get(0)?,
    family_group_id: row.get(1)?,
    name:            row.get(2)?,
    latitude:        row.get(3)?,
    longitude:       row.get(4)?,
    radius_m:        row.get(5)?,
    created_by:      row.get(6)?,
    created_at:      row.get(7)?,
  })
}

const POLICY_COLS: &str = "policy_id, name, channel, priority, \
                           first_response_minutes, resolution_minutes, \
                           escalation_enabled, escalation_threshold_minutes, \
                           escalation_target, business_hours_only, active, \
                           created_at";

fn policy_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPolicy> {
  Ok(RawPolicy {
    policy_id:                    row.get(0)?,
    name:                         row.get(1)?,
    channel:                      row.get(2)?,
    priority:                     row.get(3)?,
    first_response_minutes:       row.get(4)?,
    resolution_minutes:           row.get(5)?,
    escalation_enabled:           row.get(6)?,
    escalation_threshold_minutes: row.get(7)?,
    escalation_target:            row.get(8)?,
    business_hours_only:          row.get(9)?,
    active:                       row.get(10)?,
    created_at:                   row.get(11)?,
  })
}

const INTERACTION_COLS: &str = "interaction_id, channel, priority, subject, \
                                status, assigned_to, first_response_at, \
                                response_due_at, created_at";

fn interaction_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawInteraction> {
  Ok(RawInteraction {
    interaction_id:    row.get(0)?,
    channel:           row.get(1)?,
    priority:          row.get(2)?,
    subject:           row.get(3)?,
    status:            row.get(4)?,
    assigned_to:       row.get(5)?,
    first_response_at: row.get(6)?,
    response_due_at:   row.get(7)?,
    created_at:        row.get(8)?,
  })
}

const BREACH_COLS: &str = "breach_id, interaction_id, policy_id, kind, \
                           target_minutes, actual_minutes, breached_at, \
                           resolved_at";

fn breach_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawBreach> {
  Ok(RawBreach {
    breach_id:      row.get(0)?,
    interaction_id: row.get(1)?,
    policy_id:      row.get(2)?,
    kind:           row.get(3)?,
    target_minutes: row.get(4)?,
    actual_minutes: row.get(5)?,
    breached_at:    row.get(6)?,
    resolved_at:    row.get(7)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Haven store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. Committed
/// writes are announced to the configured [`EventSink`]; without one, events
/// are dropped.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  events: Arc<dyn EventSink>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, events: Arc::new(NullSink) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, events: Arc::new(NullSink) };
    store.init_schema().await?;
    Ok(store)
  }

  /// Announce committed writes to `sink` (typically the realtime fan-out).
  pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
    self.events = sink;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  fn publish(
    &self,
    table: Table,
    op: ChangeOp,
    row_id: Uuid,
    family_group_id: Option<Uuid>,
    incident_id: Option<Uuid>,
    user_id: Option<Uuid>,
  ) {
    self.events.publish(ChangeEvent {
      table,
      op,
      row_id,
      family_group_id,
      incident_id,
      user_id,
    });
  }

  /// Fetch an incident or fail with the core not-found error.
  async fn require_incident(&self, id: Uuid) -> Result<Incident> {
    self
      .incident(id)
      .await?
      .ok_or(Error::Core(haven_core::Error::IncidentNotFound(id)))
  }

  async fn require_interaction(&self, id: Uuid) -> Result<TrackedInteraction> {
    self
      .interaction(id)
      .await?
      .ok_or(Error::Core(haven_core::Error::InteractionNotFound(id)))
  }
}

// ─── SafetyStore impl ────────────────────────────────────────────────────────

impl SafetyStore for SqliteStore {
  type Error = Error;

  // ── Incidents ─────────────────────────────────────────────────────────────

  async fn create_incident(
    &self,
    input: NewIncident,
  ) -> Result<(Incident, LocationSample)> {
    let now = Utc::now();
    let incident = Incident {
      incident_id:     Uuid::new_v4(),
      user_id:         input.user_id,
      family_group_id: input.family_group_id,
      status:          IncidentStatus::Active,
      priority:        input.priority,
      address:         input.address,
      metadata:        input.metadata,
      created_at:      now,
    };
    let sample = LocationSample {
      sample_id:   Uuid::new_v4(),
      incident_id: incident.incident_id,
      latitude:    input.latitude,
      longitude:   input.longitude,
      accuracy_m:  input.accuracy_m,
      created_at:  now,
    };

    let incident_id_str = encode_uuid(incident.incident_id);
    let user_id_str     = encode_uuid(incident.user_id);
    let family_id_str   = encode_uuid(incident.family_group_id);
    let status_str      = encode_incident_status(incident.status).to_owned();
    let priority_str    = encode_priority(incident.priority).to_owned();
    let address         = incident.address.clone();
    let metadata_str    = incident.metadata.to_string();
    let created_at_str  = encode_dt(now);
    let sample_id_str   = encode_uuid(sample.sample_id);
    let (lat, lon, acc) = (sample.latitude, sample.longitude, sample.accuracy_m);

    self
      .conn
      .call(move |conn| {
        // Incident and first sample commit together.
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO incidents (
             incident_id, user_id, family_group_id, status, priority,
             address, metadata, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            incident_id_str,
            user_id_str,
            family_id_str,
            status_str,
            priority_str,
            address,
            metadata_str,
            created_at_str,
          ],
        )?;
        tx.execute(
          "INSERT INTO incident_locations (
             sample_id, incident_id, latitude, longitude, accuracy_m,
             created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            sample_id_str,
            incident_id_str,
            lat,
            lon,
            acc,
            created_at_str,
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    self.publish(
      Table::Incidents,
      ChangeOp::Insert,
      incident.incident_id,
      Some(incident.family_group_id),
      None,
      Some(incident.user_id),
    );
    self.publish(
      Table::IncidentLocations,
      ChangeOp::Insert,
      sample.sample_id,
      Some(incident.family_group_id),
      Some(incident.incident_id),
      None,
    );

    Ok((incident, sample))
  }

  async fn incident(&self, id: Uuid) -> Result<Option<Incident>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawIncident> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {INCIDENT_COLS} FROM incidents WHERE incident_id = ?1"
              ),
              rusqlite::params![id_str],
              incident_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawIncident::into_incident).transpose()
  }

  async fn incidents_by_family(
    &self,
    family_group_id: Uuid,
  ) -> Result<Vec<Incident>> {
    let family_str = encode_uuid(family_group_id);

    let raws: Vec<RawIncident> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INCIDENT_COLS} FROM incidents
           WHERE family_group_id = ?1
           ORDER BY created_at DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![family_str], incident_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIncident::into_incident).collect()
  }

  async fn open_incidents(&self) -> Result<Vec<Incident>> {
    let raws: Vec<RawIncident> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INCIDENT_COLS} FROM incidents
           WHERE status IN ('active', 'acknowledged')
           ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map([], incident_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIncident::into_incident).collect()
  }

  async fn transition_incident(
    &self,
    id: Uuid,
    to: IncidentStatus,
  ) -> Result<Incident> {
    let current = self.require_incident(id).await?;
    if !current.status.can_transition_to(to) {
      return Err(Error::Core(haven_core::Error::InvalidTransition {
        from: current.status,
        to,
      }));
    }

    let id_str   = encode_uuid(id);
    let to_str   = encode_incident_status(to).to_owned();
    let from_str = encode_incident_status(current.status).to_owned();

    // Compare-and-set: the guard on the previous status means a racing
    // transition cannot resurrect a terminal incident.
    let updated: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE incidents SET status = ?2
           WHERE incident_id = ?1 AND status = ?3",
          rusqlite::params![id_str, to_str, from_str],
        )?)
      })
      .await?;

    if updated == 0 {
      // Lost a race; report against the status that actually won.
      let now = self.require_incident(id).await?;
      return Err(Error::Core(haven_core::Error::InvalidTransition {
        from: now.status,
        to,
      }));
    }

    self.publish(
      Table::Incidents,
      ChangeOp::Update,
      id,
      Some(current.family_group_id),
      None,
      Some(current.user_id),
    );

    Ok(Incident { status: to, ..current })
  }

  async fn set_priority(
    &self,
    id: Uuid,
    priority: Priority,
  ) -> Result<Incident> {
    let current = self.require_incident(id).await?;

    let id_str       = encode_uuid(id);
    let priority_str = encode_priority(priority).to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE incidents SET priority = ?2 WHERE incident_id = ?1",
          rusqlite::params![id_str, priority_str],
        )?;
        Ok(())
      })
      .await?;

    self.publish(
      Table::Incidents,
      ChangeOp::Update,
      id,
      Some(current.family_group_id),
      None,
      Some(current.user_id),
    );

    Ok(Incident { priority, ..current })
  }

  async fn acknowledge(
    &self,
    input: NewAcknowledgement,
  ) -> Result<Acknowledgement> {
    let incident = self.require_incident(input.incident_id).await?;
    if !incident.status.is_open() {
      return Err(Error::Core(haven_core::Error::IncidentClosed(
        input.incident_id,
      )));
    }

    let ack = Acknowledgement {
      ack_id:          Uuid::new_v4(),
      incident_id:     input.incident_id,
      user_id:         input.user_id,
      message:         input.message,
      acknowledged_at: Utc::now(),
    };

    let ack_id_str      = encode_uuid(ack.ack_id);
    let incident_id_str = encode_uuid(ack.incident_id);
    let user_id_str     = encode_uuid(ack.user_id);
    let message         = ack.message.clone();
    let at_str          = encode_dt(ack.acknowledged_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO incident_acknowledgements (
             ack_id, incident_id, user_id, message, acknowledged_at
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            ack_id_str,
            incident_id_str,
            user_id_str,
            message,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    self.publish(
      Table::IncidentAcknowledgements,
      ChangeOp::Insert,
      ack.ack_id,
      Some(incident.family_group_id),
      Some(ack.incident_id),
      Some(ack.user_id),
    );

    Ok(ack)
  }

  async fn acknowledgements(
    &self,
    incident_id: Uuid,
  ) -> Result<Vec<Acknowledgement>> {
    let id_str = encode_uuid(incident_id);

    let raws: Vec<RawAck> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ACK_COLS} FROM incident_acknowledgements
           WHERE incident_id = ?1
           ORDER BY acknowledged_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], ack_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAck::into_ack).collect()
  }

  async fn has_acknowledged(
    &self,
    incident_id: Uuid,
    user_id: Uuid,
  ) -> Result<bool> {
    let incident_str = encode_uuid(incident_id);
    let user_str     = encode_uuid(user_id);

    let found: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM incident_acknowledgements
               WHERE incident_id = ?1 AND user_id = ?2
               LIMIT 1",
              rusqlite::params![incident_str, user_str],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(found)
  }

  async fn append_location(
    &self,
    input: NewLocationSample,
  ) -> Result<LocationSample> {
    let incident = self.require_incident(input.incident_id).await?;
    if !incident.status.is_open() {
      return Err(Error::Core(haven_core::Error::IncidentClosed(
        input.incident_id,
      )));
    }

    let sample = LocationSample {
      sample_id:   Uuid::new_v4(),
      incident_id: input.incident_id,
      latitude:    input.latitude,
      longitude:   input.longitude,
      accuracy_m:  input.accuracy_m,
      created_at:  Utc::now(),
    };

    let sample_id_str   = encode_uuid(sample.sample_id);
    let incident_id_str = encode_uuid(sample.incident_id);
    let at_str          = encode_dt(sample.created_at);
    let (lat, lon, acc) = (sample.latitude, sample.longitude, sample.accuracy_m);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO incident_locations (
             sample_id, incident_id, latitude, longitude, accuracy_m,
             created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![sample_id_str, incident_id_str, lat, lon, acc, at_str],
        )?;
        Ok(())
      })
      .await?;

    self.publish(
      Table::IncidentLocations,
      ChangeOp::Insert,
      sample.sample_id,
      Some(incident.family_group_id),
      Some(sample.incident_id),
      None,
    );

    Ok(sample)
  }

  async fn locations(&self, incident_id: Uuid) -> Result<Vec<LocationSample>> {
    let id_str = encode_uuid(incident_id);

    let raws: Vec<RawSample> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SAMPLE_COLS} FROM incident_locations
           WHERE incident_id = ?1
           ORDER BY created_at DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], sample_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSample::into_sample).collect()
  }

  // ── Presence ──────────────────────────────────────────────────────────────

  async fn upsert_live_location(
    &self,
    update: PositionUpdate,
  ) -> Result<LiveLocation> {
    let now = Utc::now();

    let user_str   = encode_uuid(update.user_id);
    let family_str = update.family_group_id.map(encode_uuid);
    let status_str = "online".to_owned();
    let now_str    = encode_dt(now);
    let query_user = user_str.clone();

    let (raw, written): (RawLiveLocation, bool) = self
      .conn
      .call(move |conn| {
        // Last write wins, with a monotonic guard: an update carrying an
        // older last_seen than the stored row is skipped entirely.
        // (RFC 3339 UTC strings compare chronologically.)
        let changed = conn.execute(
          "INSERT INTO live_locations (
             user_id, family_group_id, latitude, longitude, accuracy_m,
             heading, speed, battery_pct, status, last_seen
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT(user_id) DO UPDATE SET
             family_group_id = excluded.family_group_id,
             latitude        = excluded.latitude,
             longitude       = excluded.longitude,
             accuracy_m      = excluded.accuracy_m,
             heading         = excluded.heading,
             speed           = excluded.speed,
             battery_pct     = excluded.battery_pct,
             status          = excluded.status,
             last_seen       = excluded.last_seen
           WHERE excluded.last_seen > live_locations.last_seen",
          rusqlite::params![
            user_str,
            family_str,
            update.latitude,
            update.longitude,
            update.accuracy_m,
            update.heading,
            update.speed,
            update.battery_pct,
            status_str,
            now_str,
          ],
        )?;

        let raw = conn.query_row(
          &format!(
            "SELECT {LIVE_COLS} FROM live_locations WHERE user_id = ?1"
          ),
          rusqlite::params![query_user],
          live_row,
        )?;

        Ok((raw, changed > 0))
      })
      .await?;

    let live = raw.into_live()?;

    if written {
      self.publish(
        Table::LiveLocations,
        ChangeOp::Update,
        live.user_id,
        live.family_group_id,
        None,
        Some(live.user_id),
      );
    }

    Ok(live)
  }

  async fn set_offline(&self, user_id: Uuid) -> Result<Option<LiveLocation>> {
    let user_str   = encode_uuid(user_id);
    let query_user = user_str.clone();

    let raw: Option<RawLiveLocation> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE live_locations SET status = 'offline' WHERE user_id = ?1",
          rusqlite::params![user_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {LIVE_COLS} FROM live_locations WHERE user_id = ?1"
              ),
              rusqlite::params![query_user],
              live_row,
            )
            .optional()?,
        )
      })
      .await?;

    let live = raw.map(RawLiveLocation::into_live).transpose()?;

    if let Some(live) = &live {
      self.publish(
        Table::LiveLocations,
        ChangeOp::Update,
        live.user_id,
        live.family_group_id,
        None,
        Some(live.user_id),
      );
    }

    Ok(live)
  }

  async fn live_location(&self, user_id: Uuid) -> Result<Option<LiveLocation>> {
    let user_str = encode_uuid(user_id);

    let raw: Option<RawLiveLocation> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {LIVE_COLS} FROM live_locations WHERE user_id = ?1"
              ),
              rusqlite::params![user_str],
              live_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLiveLocation::into_live).transpose()
  }

  async fn live_locations_by_family(
    &self,
    family_group_id: Uuid,
  ) -> Result<Vec<LiveLocation>> {
    let family_str = encode_uuid(family_group_id);

    let raws: Vec<RawLiveLocation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {LIVE_COLS} FROM live_locations
           WHERE family_group_id = ?1
           ORDER BY last_seen DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![family_str], live_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLiveLocation::into_live).collect()
  }

  // ── Places ────────────────────────────────────────────────────────────────

  async fn create_place(&self, input: NewPlace) -> Result<Place> {
    // Reject before any write; the CHECK constraints are only a backstop.
    input.validate().map_err(Error::Core)?;

    let place = Place {
      place_id:        Uuid::new_v4(),
      family_group_id: input.family_group_id,
      name:            input.name,
      latitude:        input.latitude,
      longitude:       input.longitude,
      radius_m:        input.radius_m,
      created_by:      input.created_by,
      created_at:      Utc::now(),
    };

    let place_id_str   = encode_uuid(place.place_id);
    let family_str     = encode_uuid(place.family_group_id);
    let name           = place.name.clone();
    let created_by_str = encode_uuid(place.created_by);
    let at_str         = encode_dt(place.created_at);
    let (lat, lon, radius) = (place.latitude, place.longitude, place.radius_m);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO places (
             place_id, family_group_id, name, latitude, longitude, radius_m,
             created_by, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            place_id_str,
            family_str,
            name,
            lat,
            lon,
            radius,
            created_by_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    self.publish(
      Table::Places,
      ChangeOp::Insert,
      place.place_id,
      Some(place.family_group_id),
      None,
      Some(place.created_by),
    );

    Ok(place)
  }

  async fn places_by_family(
    &self,
    family_group_id: Uuid,
  ) -> Result<Vec<Place>> {
    let family_str = encode_uuid(family_group_id);

    let raws: Vec<RawPlace> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PLACE_COLS} FROM places
           WHERE family_group_id = ?1
           ORDER BY name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![family_str], place_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPlace::into_place).collect()
  }

  async fn delete_place(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    // Read family scope first so the delete event can be routed.
    let family: Option<String> = self
      .conn
      .call({
        let id_str = id_str.clone();
        move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT family_group_id FROM places WHERE place_id = ?1",
                rusqlite::params![id_str],
                |r| r.get(0),
              )
              .optional()?,
          )
        }
      })
      .await?;

    let Some(family_str) = family else {
      return Err(Error::Core(haven_core::Error::PlaceNotFound(id)));
    };

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM places WHERE place_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;

    self.publish(
      Table::Places,
      ChangeOp::Delete,
      id,
      Some(crate::encode::decode_uuid(&family_str)?),
      None,
      None,
    );

    Ok(())
  }

  // ── SLA policies ──────────────────────────────────────────────────────────

  async fn create_policy(&self, input: NewSlaPolicy) -> Result<SlaPolicy> {
    let policy = SlaPolicy {
      policy_id: Uuid::new_v4(),
      name: input.name,
      channel: input.channel,
      priority: input.priority,
      first_response_minutes: input.first_response_minutes,
      resolution_minutes: input.resolution_minutes,
      escalation_enabled: input.escalation_enabled,
      escalation_threshold_minutes: input.escalation_threshold_minutes,
      escalation_target: input.escalation_target,
      business_hours_only: input.business_hours_only,
      active: true,
      created_at: Utc::now(),
    };

    let policy_id_str = encode_uuid(policy.policy_id);
    let name          = policy.name.clone();
    let channel       = policy.channel.clone();
    let priority      = policy.priority;
    let target_str    = policy.escalation_target.map(encode_uuid);
    let at_str        = encode_dt(policy.created_at);
    let (frm, rm) = (policy.first_response_minutes, policy.resolution_minutes);
    let (esc_on, esc_min, bh) = (
      policy.escalation_enabled,
      policy.escalation_threshold_minutes,
      policy.business_hours_only,
    );

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sla_policies (
             policy_id, name, channel, priority, first_response_minutes,
             resolution_minutes, escalation_enabled,
             escalation_threshold_minutes, escalation_target,
             business_hours_only, active, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1, ?11)",
          rusqlite::params![
            policy_id_str,
            name,
            channel,
            priority,
            frm,
            rm,
            esc_on,
            esc_min,
            target_str,
            bh,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(policy)
  }

  async fn active_policies(&self) -> Result<Vec<SlaPolicy>> {
    let raws: Vec<RawPolicy> = self
      .conn
      .call(move |conn| {
        // Deterministic order: this is also the selection tie-break.
        let mut stmt = conn.prepare(&format!(
          "SELECT {POLICY_COLS} FROM sla_policies
           WHERE active = 1
           ORDER BY created_at, policy_id"
        ))?;
        let rows = stmt
          .query_map([], policy_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPolicy::into_policy).collect()
  }

  // ── Tracked interactions ──────────────────────────────────────────────────

  async fn create_interaction(
    &self,
    input: NewInteraction,
  ) -> Result<TrackedInteraction> {
    let interaction = TrackedInteraction {
      interaction_id:    Uuid::new_v4(),
      channel:           input.channel,
      priority:          input.priority,
      subject:           input.subject,
      status:            InteractionStatus::Open,
      assigned_to:       input.assigned_to,
      first_response_at: None,
      response_due_at:   None,
      created_at:        Utc::now(),
    };

    let id_str       = encode_uuid(interaction.interaction_id);
    let channel      = interaction.channel.clone();
    let priority     = interaction.priority;
    let subject      = interaction.subject.clone();
    let assigned_str = interaction.assigned_to.map(encode_uuid);
    let at_str       = encode_dt(interaction.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO tracked_interactions (
             interaction_id, channel, priority, subject, status, assigned_to,
             first_response_at, response_due_at, created_at
           ) VALUES (?1, ?2, ?3, ?4, 'open', ?5, NULL, NULL, ?6)",
          rusqlite::params![id_str, channel, priority, subject, assigned_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(interaction)
  }

  async fn interaction(
    &self,
    id: Uuid,
  ) -> Result<Option<TrackedInteraction>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawInteraction> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {INTERACTION_COLS} FROM tracked_interactions
                 WHERE interaction_id = ?1"
              ),
              rusqlite::params![id_str],
              interaction_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawInteraction::into_interaction).transpose()
  }

  async fn open_interactions(&self) -> Result<Vec<TrackedInteraction>> {
    let raws: Vec<RawInteraction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INTERACTION_COLS} FROM tracked_interactions
           WHERE status NOT IN ('resolved', 'closed')
           ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map([], interaction_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawInteraction::into_interaction)
      .collect()
  }

  async fn set_response_due(
    &self,
    id: Uuid,
    due_at: DateTime<Utc>,
  ) -> Result<()> {
    self.require_interaction(id).await?;

    let id_str  = encode_uuid(id);
    let due_str = encode_dt(due_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE tracked_interactions SET response_due_at = ?2
           WHERE interaction_id = ?1",
          rusqlite::params![id_str, due_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn record_first_response(
    &self,
    id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<()> {
    self.require_interaction(id).await?;

    let id_str = encode_uuid(id);
    let at_str = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        // Only the first response counts; later calls are no-ops.
        conn.execute(
          "UPDATE tracked_interactions SET first_response_at = ?2
           WHERE interaction_id = ?1 AND first_response_at IS NULL",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn escalate_interaction(&self, id: Uuid, target: Uuid) -> Result<bool> {
    self.require_interaction(id).await?;

    let id_str     = encode_uuid(id);
    let target_str = encode_uuid(target);

    // One-shot: the status guard makes repeated evaluation a no-op.
    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE tracked_interactions
           SET status = 'escalated', assigned_to = ?2
           WHERE interaction_id = ?1
             AND status NOT IN ('escalated', 'resolved', 'closed')
             AND first_response_at IS NULL",
          rusqlite::params![id_str, target_str],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn transition_interaction(
    &self,
    id: Uuid,
    to: InteractionStatus,
  ) -> Result<TrackedInteraction> {
    let current = self.require_interaction(id).await?;
    if current.status.is_terminal() {
      return Err(Error::Core(
        haven_core::Error::InvalidInteractionTransition {
          from: current.status,
          to,
        },
      ));
    }

    let id_str   = encode_uuid(id);
    let to_str   = encode_interaction_status(to).to_owned();
    let from_str = encode_interaction_status(current.status).to_owned();

    let updated: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE tracked_interactions SET status = ?2
           WHERE interaction_id = ?1 AND status = ?3",
          rusqlite::params![id_str, to_str, from_str],
        )?)
      })
      .await?;

    if updated == 0 {
      let now = self.require_interaction(id).await?;
      return Err(Error::Core(
        haven_core::Error::InvalidInteractionTransition {
          from: now.status,
          to,
        },
      ));
    }

    Ok(TrackedInteraction { status: to, ..current })
  }

  // ── Breaches ──────────────────────────────────────────────────────────────

  async fn open_breach(&self, input: NewBreach) -> Result<Option<SlaBreach>> {
    let breach = SlaBreach {
      breach_id:      Uuid::new_v4(),
      interaction_id: input.interaction_id,
      policy_id:      input.policy_id,
      kind:           input.kind,
      target_minutes: input.target_minutes,
      actual_minutes: input.actual_minutes,
      breached_at:    Utc::now(),
      resolved_at:    None,
    };

    let breach_id_str   = encode_uuid(breach.breach_id);
    let interaction_str = encode_uuid(breach.interaction_id);
    let policy_str      = encode_uuid(breach.policy_id);
    let kind_str        = encode_breach_kind(breach.kind).to_owned();
    let at_str          = encode_dt(breach.breached_at);
    let (target, actual) = (breach.target_minutes, breach.actual_minutes);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        // Idempotent by existence check; the partial unique index catches
        // the remaining write race.
        let exists: bool = conn
          .query_row(
            "SELECT 1 FROM sla_breaches
             WHERE interaction_id = ?1 AND kind = ?2 AND resolved_at IS NULL
             LIMIT 1",
            rusqlite::params![interaction_str, kind_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if exists {
          return Ok(false);
        }

        conn.execute(
          "INSERT INTO sla_breaches (
             breach_id, interaction_id, policy_id, kind, target_minutes,
             actual_minutes, breached_at, resolved_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
          rusqlite::params![
            breach_id_str,
            interaction_str,
            policy_str,
            kind_str,
            target,
            actual,
            at_str,
          ],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Ok(None);
    }

    self.publish(
      Table::SlaBreaches,
      ChangeOp::Insert,
      breach.breach_id,
      None,
      None,
      None,
    );

    Ok(Some(breach))
  }

  async fn unresolved_breaches(&self) -> Result<Vec<SlaBreach>> {
    let raws: Vec<RawBreach> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {BREACH_COLS} FROM sla_breaches
           WHERE resolved_at IS NULL
           ORDER BY breached_at DESC"
        ))?;
        let rows = stmt
          .query_map([], breach_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBreach::into_breach).collect()
  }

  async fn resolve_breaches(
    &self,
    interaction_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<usize> {
    let interaction_str = encode_uuid(interaction_id);
    let at_str          = encode_dt(at);

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE sla_breaches SET resolved_at = ?2
           WHERE interaction_id = ?1 AND resolved_at IS NULL",
          rusqlite::params![interaction_str, at_str],
        )?)
      })
      .await?;

    Ok(changed)
  }

  // ── Metrics reads ─────────────────────────────────────────────────────────

  async fn interactions_between(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<Vec<TrackedInteraction>> {
    let from_str = encode_dt(from);
    let to_str   = encode_dt(to);

    let raws: Vec<RawInteraction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INTERACTION_COLS} FROM tracked_interactions
           WHERE created_at >= ?1 AND created_at <= ?2
           ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![from_str, to_str], interaction_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawInteraction::into_interaction)
      .collect()
  }

  async fn breaches_between(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<usize> {
    let from_str = encode_dt(from);
    let to_str   = encode_dt(to);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM sla_breaches
           WHERE breached_at >= ?1 AND breached_at <= ?2",
          rusqlite::params![from_str, to_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count as usize)
  }
}
