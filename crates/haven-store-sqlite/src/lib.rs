//! SQLite backend for the Haven safety store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Committed writes are announced to an
//! [`haven_core::event::EventSink`] for the realtime fan-out.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
