//! `GET /events` — the SSE bridge over the realtime change bus.
//!
//! Scope the stream with `?family_group_id=` or `?incident_id=` (incident
//! wins when both are present). Each change arrives as a `change` event whose
//! data is the JSON [`haven_core::event::ChangeEvent`]; a consumer that falls
//! behind receives a `resync` event and should re-fetch instead of trusting
//! the stream.

use std::convert::Infallible;

use axum::{
  extract::{Query, State},
  response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt as _};
use haven_bus::BusEvent;
use haven_core::{event::EventFilter, store::SafetyStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscribeParams {
  pub family_group_id: Option<Uuid>,
  pub incident_id:     Option<Uuid>,
}

/// `GET /events[?family_group_id=|incident_id=]`
pub async fn subscribe<S>(
  State(state): State<AppState<S>>,
  Query(params): Query<SubscribeParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
  S: SafetyStore + Send + Sync + 'static,
{
  let filter = match (params.incident_id, params.family_group_id) {
    (Some(incident), _) => EventFilter::Incident(incident),
    (None, Some(family)) => EventFilter::FamilyGroup(family),
    (None, None) => EventFilter::All,
  };

  let stream = state.bus.subscribe(filter).map(|item| {
    Ok(match item {
      BusEvent::Change(change) => Event::default()
        .event("change")
        .data(serde_json::to_string(&change).unwrap_or_default()),
      BusEvent::Lagged(missed) => {
        Event::default().event("resync").data(missed.to_string())
      }
    })
  });

  Sse::new(stream).keep_alive(KeepAlive::default())
}
