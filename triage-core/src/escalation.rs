//! SLA escalation. One global periodic sweep over every tenant's
//! supervised incidents, not a timer per incident, so resource usage stays
//! bounded as incident count grows. Exactly-once is carried by the
//! `escalated` flag CAS in the store; the sweep-in-progress guard makes an
//! overlapping run a no-op instead of a double-fire.

use crate::assignment;
use crate::error::Result;
use crate::event_log::{EventLog, EventType};
use crate::model::{EscalationReason, EscalationRecord, Incident};
use crate::notify::{Notification, NotificationKind, NotificationSink, SENIOR_TIER};
use crate::store::Store;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct SweepOutcome {
    pub examined: usize,
    pub escalated: usize,
    /// True when another sweep was still running and this one backed off.
    pub skipped: bool,
}

pub fn sweep(
    store: &Store,
    log: &EventLog,
    sink: &dyn NotificationSink,
    guard: &AtomicBool,
    now: i64,
) -> Result<SweepOutcome> {
    if guard
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("escalation sweep still in progress, skipping this tick");
        return Ok(SweepOutcome {
            skipped: true,
            ..Default::default()
        });
    }
    let outcome = run_sweep(store, log, sink, now);
    guard.store(false, Ordering::SeqCst);
    outcome
}

fn run_sweep(
    store: &Store,
    log: &EventLog,
    sink: &dyn NotificationSink,
    now: i64,
) -> Result<SweepOutcome> {
    let mut outcome = SweepOutcome::default();
    for cfg in store.tenants()? {
        for incident in store.sla_candidates(&cfg.tenant_id)? {
            outcome.examined += 1;
            // Clock starts at assignment, or at the decision for incidents
            // still waiting on a human approval.
            let Some(clock_start) = incident.assigned_at.or(incident.decided_at) else {
                continue;
            };
            if now - clock_start <= cfg.sla_secs() {
                continue;
            }
            if escalate(store, log, sink, &incident, EscalationReason::SlaBreach, now)? {
                outcome.escalated += 1;
            }
        }
    }
    Ok(outcome)
}

/// Shared escalation path for SLA breaches and decision-side escalations
/// (no runbook, denied approval, failed remediation, manual override).
/// Returns false when the incident was already escalated; callers must
/// treat that as a no-op, including for notifications.
pub fn escalate(
    store: &Store,
    log: &EventLog,
    sink: &dyn NotificationSink,
    incident: &Incident,
    reason: EscalationReason,
    now: i64,
) -> Result<bool> {
    if !store.mark_escalated(&incident.id, reason, now)? {
        return Ok(false);
    }
    // Free the unresponsive assignee's slot; queued incidents may now fit.
    let previous_assignee = assignment::release(store, log, sink, &incident.id, now)?;
    store.insert_escalation(&EscalationRecord {
        id: None,
        incident_id: incident.id.clone(),
        triggered_at: now,
        trigger_reason: reason,
        previous_assignee: previous_assignee.clone(),
    })?;
    log.record(
        &incident.id,
        EventType::Escalated,
        format!("escalated: {}", reason.as_str()),
        Some(serde_json::json!({
            "reason": reason.as_str(),
            "previous_assignee": previous_assignee,
        })),
        now,
    )?;
    sink.notify(&Notification {
        kind: NotificationKind::Escalated,
        incident_id: incident.id.clone(),
        recipient: SENIOR_TIER.into(),
    });
    info!(
        incident_id = %incident.id,
        reason = reason.as_str(),
        previous_assignee = ?previous_assignee,
        "incident escalated"
    );
    Ok(true)
}
