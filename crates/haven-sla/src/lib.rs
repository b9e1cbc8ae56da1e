//! SLA/escalation engine over any [`haven_core::store::SafetyStore`].
//!
//! Evaluates tracked interactions against response-time policies: selects the
//! applicable policy, runs the first-response and resolution checks, records
//! breaches through the store's idempotent insert, and fires the one-shot
//! escalation. Pure selection and threshold arithmetic live in `haven-core`;
//! this crate adds the stateful orchestration (checks, sweep, alerts,
//! compliance metrics).

pub mod engine;
pub mod error;
pub mod report;

pub use engine::SlaEngine;
pub use error::{Error, Result};
pub use report::{
  AppliedPolicy, BreachAlert, ComplianceReport, SlaCheck, SlaReport,
  SweepSummary,
};
