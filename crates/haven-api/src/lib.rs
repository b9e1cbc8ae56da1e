//! JSON REST API for Haven.
//!
//! Exposes an axum [`Router`] backed by any
//! [`haven_core::store::SafetyStore`], plus the SSE change stream bridging
//! the realtime bus. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", haven_api::api_router(state))
//! ```

pub mod console;
pub mod error;
pub mod events;
pub mod incidents;
pub mod places;
pub mod presence;
pub mod sla;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use haven_bus::ChangeBus;
use haven_core::store::SafetyStore;
use haven_sla::SlaEngine;
use serde::Deserialize;

pub use error::ApiError;


// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` (overridable
/// via `HAVEN_`-prefixed environment variables).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  /// Cadence of the scheduled SLA sweep.
  #[serde(default = "default_sweep_interval_secs")]
  pub sweep_interval_secs: u64,
  /// Broadcast capacity of the change bus.
  #[serde(default = "default_bus_capacity")]
  pub bus_capacity:        usize,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("haven.db") }
fn default_sweep_interval_secs() -> u64 { 60 }
fn default_bus_capacity() -> usize { haven_bus::DEFAULT_CAPACITY }

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                default_host(),
      port:                default_port(),
      store_path:          default_store_path(),
      sweep_interval_secs: default_sweep_interval_secs(),
      bus_capacity:        default_bus_capacity(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:  Arc<S>,
  pub bus:    ChangeBus,
  pub engine: Arc<SlaEngine<S>>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      bus:    self.bus.clone(),
      engine: Arc::clone(&self.engine),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: SafetyStore + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Incidents
    .route(
      "/incidents",
      get(incidents::list::<S>).post(incidents::create::<S>),
    )
    .route("/incidents/{id}", get(incidents::get_one::<S>))
    .route("/incidents/{id}/acknowledge", post(incidents::acknowledge::<S>))
    .route("/incidents/{id}/resolve", post(incidents::resolve::<S>))
    .route("/incidents/{id}/cancel", post(incidents::cancel::<S>))
    .route(
      "/incidents/{id}/locations",
      get(incidents::locations::<S>).post(incidents::append_location::<S>),
    )
    // Presence
    .route("/presence", get(presence::list::<S>))
    .route("/presence/{user_id}", put(presence::update::<S>))
    .route("/presence/{user_id}/stop", post(presence::stop::<S>))
    // Places
    .route("/places", get(places::list::<S>).post(places::create::<S>))
    .route("/places/{id}", delete(places::delete_one::<S>))
    // Operator console
    .route("/console/queue", get(console::queue::<S>))
    .route(
      "/console/incidents/{id}/acknowledge",
      post(console::acknowledge::<S>),
    )
    .route("/console/incidents/{id}/close", post(console::close::<S>))
    .route("/console/incidents/{id}/priority", post(console::priority::<S>))
    // SLA
    .route("/sla/policies", post(sla::create_policy::<S>))
    .route("/sla/interactions", post(sla::create_interaction::<S>))
    .route(
      "/sla/interactions/{id}/status",
      get(sla::check_sla_status::<S>),
    )
    .route(
      "/sla/interactions/{id}/apply-policy",
      post(sla::apply_policy::<S>),
    )
    .route("/sla/interactions/{id}/respond", post(sla::respond::<S>))
    .route("/sla/interactions/{id}/resolve", post(sla::resolve::<S>))
    .route("/sla/breaches", get(sla::list_breach_alerts::<S>))
    .route("/sla/sweep", post(sla::sweep::<S>))
    .route("/sla/metrics", get(sla::metrics::<S>))
    // Realtime
    .route("/events", get(events::subscribe::<S>))
    .with_state(state)
}
