//! SLA types and the pure parts of the escalation engine.
//!
//! The engine (in `haven-sla`) operates over any *tracked interaction* — an
//! emergency incident mirrored onto this model, a support conversation,
//! anything with a channel, a priority, and a creation time. Policy selection
//! and threshold arithmetic are pure functions here so they can be tested
//! without a store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Policies ────────────────────────────────────────────────────────────────

/// A response-time policy. Scoped by channel, priority, both, or neither —
/// a policy with neither filter is the catch-all default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaPolicy {
  pub policy_id:                     Uuid,
  pub name:                          String,
  /// Only apply to interactions on this channel, when set.
  pub channel:                       Option<String>,
  /// Only apply to interactions at this priority, when set.
  pub priority:                      Option<i32>,
  pub first_response_minutes:        i64,
  pub resolution_minutes:            i64,
  pub escalation_enabled:            bool,
  pub escalation_threshold_minutes:  i64,
  /// The user interactions are reassigned to when escalation fires.
  pub escalation_target:             Option<Uuid>,
  /// Measure elapsed time against business-hours windows instead of the
  /// wall clock.
  pub business_hours_only:           bool,
  pub active:                        bool,
  pub created_at:                    DateTime<Utc>,
}

/// Input to [`crate::store::SafetyStore::create_policy`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSlaPolicy {
  pub name:                         String,
  pub channel:                      Option<String>,
  pub priority:                     Option<i32>,
  pub first_response_minutes:       i64,
  pub resolution_minutes:           i64,
  #[serde(default)]
  pub escalation_enabled:           bool,
  #[serde(default)]
  pub escalation_threshold_minutes: i64,
  pub escalation_target:            Option<Uuid>,
  #[serde(default)]
  pub business_hours_only:          bool,
}

/// Deterministic, specificity-scored policy selection.
///
/// A candidate is rejected outright if a declared filter disagrees with the
/// interaction. Survivors score +2 for a (matching) channel filter and +1 for
/// a (matching) priority filter; the highest score wins and equal scores
/// resolve to the earliest candidate in `policies`. A filter-less default
/// (score 0) is therefore used only when nothing more specific matches.
pub fn select_policy<'a>(
  policies: &'a [SlaPolicy],
  channel: &str,
  priority: i32,
) -> Option<&'a SlaPolicy> {
  let mut best: Option<(&SlaPolicy, u8)> = None;

  for policy in policies.iter().filter(|p| p.active) {
    if policy.channel.as_deref().is_some_and(|c| c != channel) {
      continue;
    }
    if policy.priority.is_some_and(|p| p != priority) {
      continue;
    }

    let score = u8::from(policy.channel.is_some()) * 2
      + u8::from(policy.priority.is_some());

    match best {
      // Strictly-greater keeps the first match on ties.
      Some((_, s)) if s >= score => {}
      _ => best = Some((policy, score)),
    }
  }

  best.map(|(p, _)| p)
}

// ─── Check status ────────────────────────────────────────────────────────────

/// Three-way status of a single target check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
  Ok,
  Warning,
  Breached,
}

/// Threshold arithmetic shared by the first-response and resolution checks.
///
/// `Breached` once no time remains; `Warning` inside the final quarter of the
/// target (rounded up to whole minutes, so a 10-minute target warns with 3
/// minutes left); otherwise `Ok`.
pub fn check_status(target_minutes: i64, elapsed_minutes: i64) -> CheckStatus {
  let remaining = target_minutes - elapsed_minutes;
  if remaining <= 0 {
    CheckStatus::Breached
  } else if remaining <= (target_minutes + 3).div_euclid(4) {
    CheckStatus::Warning
  } else {
    CheckStatus::Ok
  }
}

// ─── Tracked interactions ────────────────────────────────────────────────────

/// Lifecycle state of a tracked interaction. `Resolved` and `Closed` are
/// terminal; `Escalated` is still open but guards the one-shot escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionStatus {
  Open,
  Pending,
  Escalated,
  Resolved,
  Closed,
}

impl InteractionStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Resolved | Self::Closed)
  }
}

/// Anything the SLA engine guarantees a bounded response for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedInteraction {
  pub interaction_id:    Uuid,
  /// Origin channel, e.g. `"sos"`, `"chat"`, `"email"`.
  pub channel:           String,
  pub priority:          i32,
  /// Short human-readable summary shown alongside breach alerts.
  pub subject:           Option<String>,
  pub status:            InteractionStatus,
  pub assigned_to:       Option<Uuid>,
  /// When the first outbound response was recorded, if any.
  pub first_response_at: Option<DateTime<Utc>>,
  /// Deadline persisted by `apply_policy`; informational.
  pub response_due_at:   Option<DateTime<Utc>>,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::SafetyStore::create_interaction`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewInteraction {
  pub channel:     String,
  pub priority:    i32,
  pub subject:     Option<String>,
  pub assigned_to: Option<Uuid>,
}

// ─── Breaches ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachKind {
  FirstResponse,
  Resolution,
}

/// An append-only record of a missed target. At most one unresolved breach
/// exists per (interaction, kind) — the store insert is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaBreach {
  pub breach_id:      Uuid,
  pub interaction_id: Uuid,
  pub policy_id:      Uuid,
  pub kind:           BreachKind,
  pub target_minutes: i64,
  pub actual_minutes: i64,
  pub breached_at:    DateTime<Utc>,
  pub resolved_at:    Option<DateTime<Utc>>,
}

/// Input to [`crate::store::SafetyStore::open_breach`].
#[derive(Debug, Clone)]
pub struct NewBreach {
  pub interaction_id: Uuid,
  pub policy_id:      Uuid,
  pub kind:           BreachKind,
  pub target_minutes: i64,
  pub actual_minutes: i64,
}
