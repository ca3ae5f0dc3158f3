//! Assignment routing. Picks a technician for an incident by strategy,
//! lowest workload first, fairness tie-break on the longest time since
//! last assignment. Routing never blocks: with nobody eligible the
//! incident parks in the overflow queue and administrators are told.

use crate::error::Result;
use crate::event_log::{EventLog, EventType};
use crate::model::{AssignmentStrategy, Incident, IncidentStatus, QueueEntry, Technician};
use crate::notify::{Notification, NotificationKind, NotificationSink, ADMINISTRATORS};
use crate::store::Store;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned(String),
    Queued,
    /// Another router claimed the incident first; nothing to do.
    AlreadyAssigned,
}

pub fn assign(
    store: &Store,
    log: &EventLog,
    sink: &dyn NotificationSink,
    incident: &Incident,
    category: &str,
    strategy: AssignmentStrategy,
    now: i64,
) -> Result<AssignOutcome> {
    match try_assign(store, log, sink, incident, category, strategy, now)? {
        Some(outcome) => Ok(outcome),
        None => {
            store.enqueue(&QueueEntry {
                incident_id: incident.id.clone(),
                tenant_id: incident.tenant_id.clone(),
                priority_score: incident.priority_score,
                enqueued_at: now,
            })?;
            log.record(
                &incident.id,
                EventType::Queued,
                format!("no eligible technician for category '{category}'"),
                Some(serde_json::json!({
                    "category": category,
                    "priority_score": incident.priority_score,
                })),
                now,
            )?;
            sink.notify(&Notification {
                kind: NotificationKind::Overflow,
                incident_id: incident.id.clone(),
                recipient: ADMINISTRATORS.into(),
            });
            info!(
                incident_id = %incident.id,
                category = %category,
                "assignment overflow, incident queued"
            );
            Ok(AssignOutcome::Queued)
        }
    }
}

/// Selection + claim without the overflow fallback. Returns `None` when no
/// eligible technician could take the incident, so the queue drain can
/// leave an entry parked without re-notifying administrators.
fn try_assign(
    store: &Store,
    log: &EventLog,
    sink: &dyn NotificationSink,
    incident: &Incident,
    category: &str,
    strategy: AssignmentStrategy,
    now: i64,
) -> Result<Option<AssignOutcome>> {
    let mut candidates = eligible(store.available_technicians()?, category, strategy);
    rank(&mut candidates);

    for technician in candidates {
        // Escalated incidents keep their escalated status while a human
        // works them; everything else becomes assigned.
        let status = if incident.escalated {
            IncidentStatus::Escalated
        } else {
            IncidentStatus::Assigned
        };
        if store.assign_incident(&incident.id, &technician.id, status, now)? {
            store.dequeue(&incident.id)?;
            log.record(
                &incident.id,
                EventType::Assigned,
                format!("assigned to {}", technician.id),
                Some(serde_json::json!({
                    "technician_id": technician.id,
                    "category": category,
                    "strategy": strategy.as_str(),
                })),
                now,
            )?;
            sink.notify(&Notification {
                kind: NotificationKind::Assigned,
                incident_id: incident.id.clone(),
                recipient: technician.id.clone(),
            });
            info!(
                incident_id = %incident.id,
                technician_id = %technician.id,
                "incident assigned"
            );
            return Ok(Some(AssignOutcome::Assigned(technician.id)));
        }
        // The claim CAS failed: a concurrent router assigned this incident.
        // The technician ranking is stale at this point, so stop rather
        // than retrying with the next candidate.
        return Ok(Some(AssignOutcome::AlreadyAssigned));
    }
    Ok(None)
}

fn eligible(
    technicians: Vec<Technician>,
    category: &str,
    strategy: AssignmentStrategy,
) -> Vec<Technician> {
    match strategy {
        AssignmentStrategy::SkillBased => technicians
            .into_iter()
            .filter(|t| t.has_skill(category))
            .collect(),
        AssignmentStrategy::RoundRobin | AssignmentStrategy::LeastBusy => technicians,
    }
}

fn rank(candidates: &mut [Technician]) {
    candidates.sort_by(|a, b| {
        a.workload
            .cmp(&b.workload)
            .then_with(|| {
                // Never-assigned sorts before longest-idle.
                let a_last = a.last_assigned_at.unwrap_or(i64::MIN);
                let b_last = b.last_assigned_at.unwrap_or(i64::MIN);
                a_last.cmp(&b_last)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Release an incident's technician slot (resolution or escalation away
/// from an unresponsive assignee) and give queued incidents a chance.
pub fn release(
    store: &Store,
    log: &EventLog,
    sink: &dyn NotificationSink,
    incident_id: &str,
    now: i64,
) -> Result<Option<String>> {
    let previous = store.clear_assignee(incident_id)?;
    if let Some(technician_id) = &previous {
        debug!(
            incident_id = %incident_id,
            technician_id = %technician_id,
            "assignment slot released"
        );
        drain_queue(store, log, sink, now)?;
    }
    Ok(previous)
}

/// Walk the overflow queue in (priority desc, enqueued_at asc) order and
/// attempt each entry. An unassignable entry stays parked and does not
/// block later entries whose categories do have available technicians.
pub fn drain_queue(
    store: &Store,
    log: &EventLog,
    sink: &dyn NotificationSink,
    now: i64,
) -> Result<usize> {
    let mut assigned = 0;
    for entry in store.queued_entries()? {
        let Some(incident) = store.incident(&entry.incident_id)? else {
            store.dequeue(&entry.incident_id)?;
            continue;
        };
        // Tenant deleted or incident closed/claimed since it was queued.
        let Some(cfg) = store.tenant(&incident.tenant_id)? else {
            store.dequeue(&entry.incident_id)?;
            continue;
        };
        if incident.status == IncidentStatus::Resolved || incident.assigned_to.is_some() {
            store.dequeue(&entry.incident_id)?;
            continue;
        }

        let category = routing_category(store, &incident)?;
        if let Some(AssignOutcome::Assigned(_)) = try_assign(
            store,
            log,
            sink,
            &incident,
            &category,
            cfg.assignment_strategy,
            now,
        )? {
            assigned += 1;
        }
    }
    Ok(assigned)
}

/// The category used for routing: the recorded decision's recommendation
/// when present, otherwise the incident's own classification.
pub fn routing_category(store: &Store, incident: &Incident) -> Result<String> {
    let from_decision = store
        .decision(&incident.id)?
        .and_then(|d| d.technician_category);
    Ok(from_decision.unwrap_or_else(|| incident.category.clone()))
}
