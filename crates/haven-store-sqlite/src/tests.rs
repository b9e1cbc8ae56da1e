//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use haven_core::{
  incident::{
    IncidentStatus, NewAcknowledgement, NewIncident, NewLocationSample,
    Priority,
  },
  place::NewPlace,
  presence::{PositionUpdate, PresenceStatus},
  sla::{BreachKind, InteractionStatus, NewBreach, NewInteraction, NewSlaPolicy},
  store::SafetyStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn sos(user: Uuid, family: Uuid) -> NewIncident {
  NewIncident::new(user, family, 51.5, -0.12, 15.0)
}

fn update(user: Uuid, family: Uuid) -> PositionUpdate {
  PositionUpdate {
    user_id:         user,
    family_group_id: Some(family),
    latitude:        51.5,
    longitude:       -0.12,
    accuracy_m:      10.0,
    heading:         Some(90.0),
    speed:           Some(1.2),
    battery_pct:     Some(80.0),
  }
}

fn interaction(channel: &str, priority: i32) -> NewInteraction {
  NewInteraction {
    channel:     channel.into(),
    priority,
    subject:     Some("help request".into()),
    assigned_to: None,
  }
}

fn policy(first_response: i64) -> NewSlaPolicy {
  NewSlaPolicy {
    name: "default".into(),
    channel: None,
    priority: None,
    first_response_minutes: first_response,
    resolution_minutes: 60,
    escalation_enabled: false,
    escalation_threshold_minutes: 0,
    escalation_target: None,
    business_hours_only: false,
  }
}

// ─── Incident lifecycle ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_incident_writes_first_sample() {
  let s = store().await;
  let (user, family) = (Uuid::new_v4(), Uuid::new_v4());

  let (incident, sample) = s.create_incident(sos(user, family)).await.unwrap();
  assert_eq!(incident.status, IncidentStatus::Active);
  assert_eq!(sample.incident_id, incident.incident_id);

  let trail = s.locations(incident.incident_id).await.unwrap();
  assert_eq!(trail.len(), 1);
  assert_eq!(trail[0].sample_id, sample.sample_id);
}

#[tokio::test]
async fn terminal_status_never_changes_again() {
  let s = store().await;
  let (incident, _) = s
    .create_incident(sos(Uuid::new_v4(), Uuid::new_v4()))
    .await
    .unwrap();

  s.transition_incident(incident.incident_id, IncidentStatus::Resolved)
    .await
    .unwrap();

  for to in [
    IncidentStatus::Active,
    IncidentStatus::Acknowledged,
    IncidentStatus::Canceled,
    IncidentStatus::Resolved,
  ] {
    let err = s
      .transition_incident(incident.incident_id, to)
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      crate::Error::Core(haven_core::Error::InvalidTransition { .. })
    ));
  }

  let row = s.incident(incident.incident_id).await.unwrap().unwrap();
  assert_eq!(row.status, IncidentStatus::Resolved);
}

#[tokio::test]
async fn transition_unknown_incident_errors() {
  let s = store().await;
  let err = s
    .transition_incident(Uuid::new_v4(), IncidentStatus::Resolved)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(haven_core::Error::IncidentNotFound(_))
  ));
}

#[tokio::test]
async fn closed_incident_rejects_live_writes_but_keeps_history() {
  let s = store().await;
  let (incident, _) = s
    .create_incident(sos(Uuid::new_v4(), Uuid::new_v4()))
    .await
    .unwrap();

  s.append_location(NewLocationSample {
    incident_id: incident.incident_id,
    latitude:    51.6,
    longitude:   -0.13,
    accuracy_m:  8.0,
  })
  .await
  .unwrap();

  s.transition_incident(incident.incident_id, IncidentStatus::Canceled)
    .await
    .unwrap();

  let err = s
    .append_location(NewLocationSample {
      incident_id: incident.incident_id,
      latitude:    51.7,
      longitude:   -0.14,
      accuracy_m:  8.0,
    })
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(haven_core::Error::IncidentClosed(_))
  ));

  let err = s
    .acknowledge(NewAcknowledgement {
      incident_id: incident.incident_id,
      user_id:     Uuid::new_v4(),
      message:     None,
    })
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(haven_core::Error::IncidentClosed(_))
  ));

  // Historical reads still succeed.
  assert_eq!(s.locations(incident.incident_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn sos_scenario_end_to_end() {
  let s = store().await;
  let (user, family) = (Uuid::new_v4(), Uuid::new_v4());
  let (sister, brother) = (Uuid::new_v4(), Uuid::new_v4());

  // T0: trigger with an immediate sample.
  let (incident, _) = s.create_incident(sos(user, family)).await.unwrap();

  // Two family members acknowledge.
  s.acknowledge(NewAcknowledgement {
    incident_id: incident.incident_id,
    user_id:     sister,
    message:     Some("on my way".into()),
  })
  .await
  .unwrap();
  s.acknowledge(NewAcknowledgement {
    incident_id: incident.incident_id,
    user_id:     brother,
    message:     None,
  })
  .await
  .unwrap();

  assert!(
    s.has_acknowledged(incident.incident_id, sister)
      .await
      .unwrap()
  );
  assert!(
    !s.has_acknowledged(incident.incident_id, Uuid::new_v4())
      .await
      .unwrap()
  );

  // Operator takes ownership, then closes.
  s.transition_incident(incident.incident_id, IncidentStatus::Acknowledged)
    .await
    .unwrap();
  s.transition_incident(incident.incident_id, IncidentStatus::Resolved)
    .await
    .unwrap();

  let row = s.incident(incident.incident_id).await.unwrap().unwrap();
  assert_eq!(row.status, IncidentStatus::Resolved);
  assert_eq!(
    s.acknowledgements(incident.incident_id).await.unwrap().len(),
    2
  );
  assert!(!s.locations(incident.incident_id).await.unwrap().is_empty());

  // Closed: no further live writes.
  assert!(
    s.acknowledge(NewAcknowledgement {
      incident_id: incident.incident_id,
      user_id:     sister,
      message:     None,
    })
    .await
    .is_err()
  );
}

#[tokio::test]
async fn open_incidents_is_the_console_queue() {
  let s = store().await;
  let family = Uuid::new_v4();

  let (a, _) = s.create_incident(sos(Uuid::new_v4(), family)).await.unwrap();
  let (b, _) = s.create_incident(sos(Uuid::new_v4(), family)).await.unwrap();
  s.transition_incident(a.incident_id, IncidentStatus::Acknowledged)
    .await
    .unwrap();

  assert_eq!(s.open_incidents().await.unwrap().len(), 2);

  s.transition_incident(b.incident_id, IncidentStatus::Canceled)
    .await
    .unwrap();
  let queue = s.open_incidents().await.unwrap();
  assert_eq!(queue.len(), 1);
  assert_eq!(queue[0].incident_id, a.incident_id);
}

#[tokio::test]
async fn duplicate_acknowledgements_are_permitted_by_the_data_layer() {
  let s = store().await;
  let (incident, _) = s
    .create_incident(sos(Uuid::new_v4(), Uuid::new_v4()))
    .await
    .unwrap();
  let responder = Uuid::new_v4();

  for _ in 0..2 {
    s.acknowledge(NewAcknowledgement {
      incident_id: incident.incident_id,
      user_id:     responder,
      message:     None,
    })
    .await
    .unwrap();
  }

  assert_eq!(
    s.acknowledgements(incident.incident_id).await.unwrap().len(),
    2
  );
}

#[tokio::test]
async fn set_priority_reclassifies() {
  let s = store().await;
  let (incident, _) = s
    .create_incident(sos(Uuid::new_v4(), Uuid::new_v4()))
    .await
    .unwrap();

  let updated = s
    .set_priority(incident.incident_id, Priority::Low)
    .await
    .unwrap();
  assert_eq!(updated.priority, Priority::Low);

  let row = s.incident(incident.incident_id).await.unwrap().unwrap();
  assert_eq!(row.priority, Priority::Low);
}

// ─── Presence ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_live_row_per_user_last_write_wins() {
  let s = store().await;
  let (user, family) = (Uuid::new_v4(), Uuid::new_v4());

  s.upsert_live_location(update(user, family)).await.unwrap();

  let mut second = update(user, family);
  second.latitude = 52.0;
  let row = s.upsert_live_location(second).await.unwrap();

  assert_eq!(row.latitude, 52.0);
  assert_eq!(row.status, PresenceStatus::Online);

  let all = s.live_locations_by_family(family).await.unwrap();
  assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn explicit_stop_flips_offline_once() {
  let s = store().await;
  let (user, family) = (Uuid::new_v4(), Uuid::new_v4());

  s.upsert_live_location(update(user, family)).await.unwrap();
  let row = s.set_offline(user).await.unwrap().unwrap();
  assert_eq!(row.status, PresenceStatus::Offline);

  // A later update brings the user back online.
  let row = s.upsert_live_location(update(user, family)).await.unwrap();
  assert_eq!(row.status, PresenceStatus::Online);
}

#[tokio::test]
async fn stop_for_unknown_user_is_none() {
  let s = store().await;
  assert!(s.set_offline(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Places ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn place_radius_boundaries() {
  let s = store().await;
  let family = Uuid::new_v4();

  let make = |radius_m: f64| NewPlace {
    family_group_id: family,
    name:            "School".into(),
    latitude:        51.5,
    longitude:       -0.12,
    radius_m,
    created_by:      Uuid::new_v4(),
  };

  assert!(s.create_place(make(49.0)).await.is_err());
  assert!(s.create_place(make(50.0)).await.is_ok());
  assert!(s.create_place(make(1000.0)).await.is_ok());
  assert!(s.create_place(make(1001.0)).await.is_err());

  // The two rejected places persisted nothing.
  assert_eq!(s.places_by_family(family).await.unwrap().len(), 2);
}

#[tokio::test]
async fn delete_place_removes_the_row() {
  let s = store().await;
  let family = Uuid::new_v4();

  let place = s
    .create_place(NewPlace {
      family_group_id: family,
      name:            "Home".into(),
      latitude:        51.5,
      longitude:       -0.12,
      radius_m:        100.0,
      created_by:      Uuid::new_v4(),
    })
    .await
    .unwrap();

  s.delete_place(place.place_id).await.unwrap();
  assert!(s.places_by_family(family).await.unwrap().is_empty());

  let err = s.delete_place(place.place_id).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(haven_core::Error::PlaceNotFound(_))
  ));
}

// ─── SLA ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn breach_insert_is_idempotent_per_kind() {
  let s = store().await;
  let p = s.create_policy(policy(10)).await.unwrap();
  let i = s.create_interaction(interaction("chat", 2)).await.unwrap();

  let breach = NewBreach {
    interaction_id: i.interaction_id,
    policy_id:      p.policy_id,
    kind:           BreachKind::FirstResponse,
    target_minutes: 10,
    actual_minutes: 12,
  };

  assert!(s.open_breach(breach.clone()).await.unwrap().is_some());
  assert!(s.open_breach(breach.clone()).await.unwrap().is_none());
  assert!(s.open_breach(breach).await.unwrap().is_none());

  // A different kind is a different breach.
  assert!(
    s.open_breach(NewBreach {
      interaction_id: i.interaction_id,
      policy_id:      p.policy_id,
      kind:           BreachKind::Resolution,
      target_minutes: 60,
      actual_minutes: 75,
    })
    .await
    .unwrap()
    .is_some()
  );

  assert_eq!(s.unresolved_breaches().await.unwrap().len(), 2);
}

#[tokio::test]
async fn resolving_breaches_reopens_the_kind() {
  let s = store().await;
  let p = s.create_policy(policy(10)).await.unwrap();
  let i = s.create_interaction(interaction("chat", 2)).await.unwrap();

  let breach = NewBreach {
    interaction_id: i.interaction_id,
    policy_id:      p.policy_id,
    kind:           BreachKind::FirstResponse,
    target_minutes: 10,
    actual_minutes: 12,
  };
  s.open_breach(breach.clone()).await.unwrap();

  assert_eq!(
    s.resolve_breaches(i.interaction_id, Utc::now()).await.unwrap(),
    1
  );
  assert!(s.unresolved_breaches().await.unwrap().is_empty());

  // Once resolved, a fresh breach of the same kind may be recorded.
  assert!(s.open_breach(breach).await.unwrap().is_some());
}

#[tokio::test]
async fn escalation_is_one_shot() {
  let s = store().await;
  let i = s.create_interaction(interaction("sos", 1)).await.unwrap();
  let (first, second) = (Uuid::new_v4(), Uuid::new_v4());

  assert!(s.escalate_interaction(i.interaction_id, first).await.unwrap());
  assert!(!s.escalate_interaction(i.interaction_id, second).await.unwrap());

  let row = s.interaction(i.interaction_id).await.unwrap().unwrap();
  assert_eq!(row.status, InteractionStatus::Escalated);
  assert_eq!(row.assigned_to, Some(first));
}

#[tokio::test]
async fn escalation_skipped_after_first_response() {
  let s = store().await;
  let i = s.create_interaction(interaction("chat", 2)).await.unwrap();

  s.record_first_response(i.interaction_id, Utc::now())
    .await
    .unwrap();
  assert!(
    !s.escalate_interaction(i.interaction_id, Uuid::new_v4())
      .await
      .unwrap()
  );
}

#[tokio::test]
async fn first_response_is_recorded_once() {
  let s = store().await;
  let i = s.create_interaction(interaction("email", 3)).await.unwrap();

  let first = Utc::now() - Duration::minutes(5);
  s.record_first_response(i.interaction_id, first).await.unwrap();
  s.record_first_response(i.interaction_id, Utc::now())
    .await
    .unwrap();

  let row = s.interaction(i.interaction_id).await.unwrap().unwrap();
  assert_eq!(row.first_response_at, Some(first));
}

#[tokio::test]
async fn terminal_interaction_rejects_transitions() {
  let s = store().await;
  let i = s.create_interaction(interaction("chat", 2)).await.unwrap();

  s.transition_interaction(i.interaction_id, InteractionStatus::Resolved)
    .await
    .unwrap();
  let err = s
    .transition_interaction(i.interaction_id, InteractionStatus::Open)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(haven_core::Error::InvalidInteractionTransition { .. })
  ));

  assert!(s.open_interactions().await.unwrap().is_empty());
}

#[tokio::test]
async fn active_policies_order_is_deterministic() {
  let s = store().await;
  let mut named = policy(10);
  named.name = "first".into();
  s.create_policy(named).await.unwrap();
  let mut named = policy(20);
  named.name = "second".into();
  s.create_policy(named).await.unwrap();

  let policies = s.active_policies().await.unwrap();
  assert_eq!(policies.len(), 2);
  assert_eq!(policies[0].name, "first");
  assert_eq!(policies[1].name, "second");
}

#[tokio::test]
async fn metrics_reads_window_by_time() {
  let s = store().await;
  let p = s.create_policy(policy(10)).await.unwrap();
  let i = s.create_interaction(interaction("chat", 2)).await.unwrap();
  s.open_breach(NewBreach {
    interaction_id: i.interaction_id,
    policy_id:      p.policy_id,
    kind:           BreachKind::FirstResponse,
    target_minutes: 10,
    actual_minutes: 12,
  })
  .await
  .unwrap();

  let now = Utc::now();
  let hour_ago = now - Duration::hours(1);

  assert_eq!(
    s.interactions_between(hour_ago, now + Duration::minutes(1))
      .await
      .unwrap()
      .len(),
    1
  );
  assert_eq!(
    s.breaches_between(hour_ago, now + Duration::minutes(1))
      .await
      .unwrap(),
    1
  );
  assert_eq!(
    s.breaches_between(hour_ago - Duration::hours(2), hour_ago)
      .await
      .unwrap(),
    0
  );
}
