//! The stateful engine: checks, breach recording, escalation, sweep, metrics.

use chrono::{DateTime, Duration, Utc};
use haven_core::{
  hours::BusinessHours,
  sla::{
    self, BreachKind, CheckStatus, InteractionStatus, NewBreach, SlaPolicy,
    TrackedInteraction,
  },
  store::SafetyStore,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  report::{
    AppliedPolicy, BreachAlert, ComplianceReport, SlaCheck, SlaReport,
    SweepSummary,
  },
};

fn store_err<E>(e: E) -> Error
where E: std::error::Error + Send + Sync + 'static {
  Error::Store(Box::new(e))
}

fn run_check(target_minutes: i64, elapsed_minutes: i64) -> SlaCheck {
  SlaCheck {
    status: sla::check_status(target_minutes, elapsed_minutes),
    target_minutes,
    elapsed_minutes,
    remaining_minutes: target_minutes - elapsed_minutes,
  }
}

/// Minutes on the policy's clock between `from` and `to` — the business-hours
/// intersection when the policy asks for it, wall-clock otherwise.
fn policy_elapsed(
  hours: &BusinessHours,
  policy: &SlaPolicy,
  from: DateTime<Utc>,
  to: DateTime<Utc>,
) -> i64 {
  if policy.business_hours_only {
    hours.elapsed_minutes(from, to)
  } else {
    (to - from).num_minutes().max(0)
  }
}

/// Minutes of no-first-response after which escalation fires. The
/// first-response target always bounds the cutoff; a non-positive threshold
/// counts as unset.
fn escalation_cutoff(policy: &SlaPolicy) -> i64 {
  if policy.escalation_threshold_minutes > 0 {
    policy.first_response_minutes.min(policy.escalation_threshold_minutes)
  } else {
    policy.first_response_minutes
  }
}

/// Evaluates interactions against policies and drives the store's breach and
/// escalation writes. Every entry point takes `now` explicitly.
pub struct SlaEngine<S> {
  store: S,
  hours: BusinessHours,
}

impl<S: SafetyStore> SlaEngine<S> {
  pub fn new(store: S) -> Self {
    Self { store, hours: BusinessHours::default() }
  }

  pub fn with_hours(mut self, hours: BusinessHours) -> Self {
    self.hours = hours;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  /// Evaluate one interaction at `now`. Returns `None` when no active policy
  /// matches the interaction's channel and priority.
  ///
  /// A `Breached` check records the breach through the store's idempotent
  /// insert; only newly inserted rows count towards `new_breaches`, so
  /// re-evaluating a breached interaction is a no-op. The escalation rule
  /// fires at most once per interaction (guarded by the store).
  pub async fn check(
    &self,
    interaction_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Option<SlaReport>> {
    let interaction = self
      .store
      .interaction(interaction_id)
      .await
      .map_err(store_err)?
      .ok_or(Error::InteractionNotFound(interaction_id))?;

    let policies = self.store.active_policies().await.map_err(store_err)?;
    let Some(policy) =
      sla::select_policy(&policies, &interaction.channel, interaction.priority)
        .cloned()
    else {
      return Ok(None);
    };

    let open = !interaction.status.is_terminal();
    let elapsed =
      policy_elapsed(&self.hours, &policy, interaction.created_at, now);

    let first_response = (open && interaction.first_response_at.is_none())
      .then(|| run_check(policy.first_response_minutes, elapsed));
    let resolution =
      open.then(|| run_check(policy.resolution_minutes, elapsed));

    let mut new_breaches = 0;
    for (check, kind, target) in [
      (&first_response, BreachKind::FirstResponse, policy.first_response_minutes),
      (&resolution, BreachKind::Resolution, policy.resolution_minutes),
    ] {
      if check.is_some_and(|c| c.status == CheckStatus::Breached) {
        let inserted = self
          .store
          .open_breach(NewBreach {
            interaction_id,
            policy_id: policy.policy_id,
            kind,
            target_minutes: target,
            actual_minutes: elapsed,
          })
          .await
          .map_err(store_err)?;
        if inserted.is_some() {
          tracing::warn!(
            interaction = %interaction_id,
            policy = %policy.name,
            ?kind,
            elapsed,
            "sla target missed"
          );
          new_breaches += 1;
        }
      }
    }

    let mut escalated = false;
    if policy.escalation_enabled
      && open
      && interaction.status != InteractionStatus::Escalated
      && interaction.first_response_at.is_none()
      && elapsed >= escalation_cutoff(&policy)
    {
      if let Some(target) = policy.escalation_target {
        escalated = self
          .store
          .escalate_interaction(interaction_id, target)
          .await
          .map_err(store_err)?;
        if escalated {
          tracing::info!(
            interaction = %interaction_id,
            target = %target,
            elapsed,
            "interaction escalated"
          );
        }
      }
    }

    Ok(Some(SlaReport {
      interaction_id,
      policy,
      first_response,
      resolution,
      escalated,
      new_breaches,
    }))
  }

  /// Select the interaction's policy and persist its first-response deadline
  /// (`created_at + first_response_minutes`). `None` when no policy matches.
  pub async fn apply_policy(
    &self,
    interaction_id: Uuid,
  ) -> Result<Option<AppliedPolicy>> {
    let interaction = self
      .store
      .interaction(interaction_id)
      .await
      .map_err(store_err)?
      .ok_or(Error::InteractionNotFound(interaction_id))?;

    let policies = self.store.active_policies().await.map_err(store_err)?;
    let Some(policy) =
      sla::select_policy(&policies, &interaction.channel, interaction.priority)
        .cloned()
    else {
      return Ok(None);
    };

    let response_due_at =
      interaction.created_at + Duration::minutes(policy.first_response_minutes);
    self
      .store
      .set_response_due(interaction_id, response_due_at)
      .await
      .map_err(store_err)?;

    Ok(Some(AppliedPolicy { policy, response_due_at }))
  }

  /// Evaluate every non-terminal interaction. Per-interaction failures are
  /// logged and skipped so one bad row never starves the rest of the sweep.
  pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepSummary> {
    let open = self.store.open_interactions().await.map_err(store_err)?;
    let mut summary = SweepSummary::default();

    for interaction in open {
      match self.check(interaction.interaction_id, now).await {
        Ok(report) => {
          summary.checked += 1;
          if let Some(report) = report {
            summary.new_breaches += report.new_breaches;
          }
        }
        Err(e) => {
          tracing::warn!(
            interaction = %interaction.interaction_id,
            error = %e,
            "sweep check failed"
          );
        }
      }
    }

    Ok(summary)
  }

  /// Unresolved breaches, each joined with its interaction.
  pub async fn breach_alerts(&self) -> Result<Vec<BreachAlert>> {
    let breaches =
      self.store.unresolved_breaches().await.map_err(store_err)?;

    let mut alerts = Vec::with_capacity(breaches.len());
    for breach in breaches {
      let interaction = self
        .store
        .interaction(breach.interaction_id)
        .await
        .map_err(store_err)?;
      alerts.push(BreachAlert { breach, interaction });
    }
    Ok(alerts)
  }

  /// Record the first outbound response (idempotent at the store).
  pub async fn record_response(
    &self,
    interaction_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<TrackedInteraction> {
    self
      .store
      .record_first_response(interaction_id, at)
      .await
      .map_err(store_err)?;
    self
      .store
      .interaction(interaction_id)
      .await
      .map_err(store_err)?
      .ok_or(Error::InteractionNotFound(interaction_id))
  }

  /// Resolve the interaction and close out its unresolved breaches.
  pub async fn resolve(
    &self,
    interaction_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<TrackedInteraction> {
    let interaction = self
      .store
      .transition_interaction(interaction_id, InteractionStatus::Resolved)
      .await
      .map_err(store_err)?;
    self
      .store
      .resolve_breaches(interaction_id, at)
      .await
      .map_err(store_err)?;
    Ok(interaction)
  }

  /// Compliance over interactions created inside `[from, to]`.
  pub async fn metrics(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<ComplianceReport> {
    let interactions =
      self.store.interactions_between(from, to).await.map_err(store_err)?;
    let total_breaches =
      self.store.breaches_between(from, to).await.map_err(store_err)?;

    let total_interactions = interactions.len();
    let compliance_rate_pct = if total_interactions == 0 {
      100.0
    } else {
      (1.0 - total_breaches as f64 / total_interactions as f64).max(0.0)
        * 100.0
    };

    let response_minutes: Vec<f64> = interactions
      .iter()
      .filter_map(|i| {
        i.first_response_at
          .map(|at| (at - i.created_at).num_minutes() as f64)
      })
      .collect();
    let avg_first_response_minutes = (!response_minutes.is_empty()).then(|| {
      response_minutes.iter().sum::<f64>() / response_minutes.len() as f64
    });

    Ok(ComplianceReport {
      total_interactions,
      total_breaches,
      compliance_rate_pct,
      avg_first_response_minutes,
    })
  }
}

#[cfg(test)]
mod unit {
  use super::*;

  fn policy(threshold: i64) -> SlaPolicy {
    SlaPolicy {
      policy_id:                    Uuid::new_v4(),
      name:                         "p".into(),
      channel:                      None,
      priority:                     None,
      first_response_minutes:       10,
      resolution_minutes:           60,
      escalation_enabled:           true,
      escalation_threshold_minutes: threshold,
      escalation_target:            Some(Uuid::new_v4()),
      business_hours_only:          false,
      active:                       true,
      created_at:                   Utc::now(),
    }
  }

  #[test]
  fn cutoff_is_bounded_by_the_first_response_target() {
    assert_eq!(escalation_cutoff(&policy(5)), 5);
    assert_eq!(escalation_cutoff(&policy(30)), 10);
    assert_eq!(escalation_cutoff(&policy(0)), 10);
  }

  #[test]
  fn business_hours_policies_use_the_schedule_clock() {
    let hours = BusinessHours::default();
    let mut p = policy(0);
    p.business_hours_only = true;

    // Friday 16:00 to Monday 10:00: one hour Friday, one hour Monday.
    let from = "2024-03-01T16:00:00Z".parse().unwrap();
    let to = "2024-03-04T10:00:00Z".parse().unwrap();
    assert_eq!(policy_elapsed(&hours, &p, from, to), 120);

    p.business_hours_only = false;
    assert_eq!(policy_elapsed(&hours, &p, from, to), 66 * 60);
  }
}
