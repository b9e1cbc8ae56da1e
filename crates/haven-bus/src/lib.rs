//! Realtime fan-out for Haven change events.
//!
//! A thin predicate-filtered wrapper over a [`tokio::sync::broadcast`]
//! channel. Delivery is at-least-once from the consumer's point of view:
//! a subscriber that falls behind the channel capacity receives an explicit
//! [`BusEvent::Lagged`] resync cue instead of silently missing rows, and is
//! expected to re-fetch. Ordering is only per-publisher commit order; events
//! are cues to re-query, never complete deltas.

use std::{
  pin::Pin,
  task::{Context, Poll, ready},
};

use futures::Stream;
use haven_core::event::{ChangeEvent, EventFilter, EventSink};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{
  BroadcastStream, errors::BroadcastStreamRecvError,
};

/// Default broadcast capacity; a slow consumer further behind than this
/// lags and resyncs.
pub const DEFAULT_CAPACITY: usize = 1024;

// ─── Bus ─────────────────────────────────────────────────────────────────────

/// The fan-out hub. Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct ChangeBus {
  tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBus {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

impl ChangeBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  /// Open a filtered subscription. Events published before this call are
  /// not delivered.
  pub fn subscribe(&self, filter: EventFilter) -> ChangeStream {
    ChangeStream {
      inner: BroadcastStream::new(self.tx.subscribe()),
      filter,
    }
  }

  pub fn subscriber_count(&self) -> usize { self.tx.receiver_count() }
}

impl EventSink for ChangeBus {
  fn publish(&self, event: ChangeEvent) {
    // A send with no subscribers is fine; fan-out is best-effort.
    let _ = self.tx.send(event);
  }
}

// ─── Stream ──────────────────────────────────────────────────────────────────

/// What a subscriber sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
  Change(ChangeEvent),
  /// The channel dropped this many events for the subscriber. Treat as a
  /// cue to re-fetch everything covered by the filter.
  Lagged(u64),
}

/// A filtered stream of change events. Ends when the bus is dropped.
pub struct ChangeStream {
  inner:  BroadcastStream<ChangeEvent>,
  filter: EventFilter,
}

impl Stream for ChangeStream {
  type Item = BusEvent;

  fn poll_next(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Option<Self::Item>> {
    loop {
      match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
        None => return Poll::Ready(None),
        Some(Ok(event)) if self.filter.matches(&event) => {
          return Poll::Ready(Some(BusEvent::Change(event)));
        }
        // Filtered out; keep polling.
        Some(Ok(_)) => {}
        Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
          return Poll::Ready(Some(BusEvent::Lagged(missed)));
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use haven_core::event::{ChangeOp, Table};
  use tokio_stream::StreamExt as _;
  use uuid::Uuid;

  use super::*;

  fn event(table: Table, family: Option<Uuid>) -> ChangeEvent {
    ChangeEvent {
      table,
      op: ChangeOp::Insert,
      row_id: Uuid::new_v4(),
      family_group_id: family,
      incident_id: None,
      user_id: None,
    }
  }

  #[tokio::test]
  async fn subscriber_receives_matching_events_only() {
    let bus = ChangeBus::default();
    let family = Uuid::new_v4();
    let mut stream = bus.subscribe(EventFilter::FamilyGroup(family));

    bus.publish(event(Table::Incidents, Some(Uuid::new_v4())));
    let matching = event(Table::Incidents, Some(family));
    bus.publish(matching.clone());

    assert_eq!(stream.next().await, Some(BusEvent::Change(matching)));
  }

  #[tokio::test]
  async fn every_subscriber_sees_the_event() {
    let bus = ChangeBus::default();
    let mut a = bus.subscribe(EventFilter::All);
    let mut b = bus.subscribe(EventFilter::Table(Table::Places));
    assert_eq!(bus.subscriber_count(), 2);

    let e = event(Table::Places, None);
    bus.publish(e.clone());

    assert_eq!(a.next().await, Some(BusEvent::Change(e.clone())));
    assert_eq!(b.next().await, Some(BusEvent::Change(e)));
  }

  #[tokio::test]
  async fn slow_subscriber_gets_a_resync_cue() {
    let bus = ChangeBus::new(1);
    let mut stream = bus.subscribe(EventFilter::All);

    for _ in 0..3 {
      bus.publish(event(Table::Incidents, None));
    }

    // Two events were dropped; the survivor follows the cue.
    assert_eq!(stream.next().await, Some(BusEvent::Lagged(2)));
    assert!(matches!(stream.next().await, Some(BusEvent::Change(_))));
  }

  #[tokio::test]
  async fn stream_ends_when_the_bus_is_dropped() {
    let bus = ChangeBus::default();
    let mut stream = bus.subscribe(EventFilter::All);
    drop(bus);
    assert_eq!(stream.next().await, None);
  }

  #[tokio::test]
  async fn publish_without_subscribers_is_a_no_op() {
    let bus = ChangeBus::default();
    bus.publish(event(Table::Incidents, None));
    assert_eq!(bus.subscriber_count(), 0);
  }
}
