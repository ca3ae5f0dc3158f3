//! The engine facade. Owns the store, the incident event log, and the
//! external seams (runbook catalog, execution connector, notification
//! sink), and serializes all pipeline work per tenant: two concurrent
//! sweeps over the same tenant can never both create an incident for one
//! grouping key or both execute the same runbook. Different tenants
//! proceed in parallel.

use crate::assignment::{self, AssignOutcome};
use crate::config::TenantConfig;
use crate::correlation::{self, CorrelationOutcome};
use crate::decision;
use crate::error::{EngineError, Result};
use crate::escalation::{self, SweepOutcome};
use crate::event_log::{EventLog, EventType};
use crate::executor::{ExecutionConnector, ExecutionRequest};
use crate::model::{
    Alert, Decision, DecisionOutcome, EscalationReason, Execution, ExecutionStatus, Incident,
    IncidentStatus, RecommendedAction, Technician,
};
use crate::notify::NotificationSink;
use crate::runbooks::RunbookCatalog;
use crate::scoring;
use crate::store::Store;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Engine {
    store: Store,
    log: EventLog,
    catalog: Arc<dyn RunbookCatalog>,
    connector: Arc<dyn ExecutionConnector>,
    sink: Arc<dyn NotificationSink>,
    tenant_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    sweep_active: AtomicBool,
}

impl Engine {
    pub fn open(
        path: impl AsRef<Path>,
        catalog: Arc<dyn RunbookCatalog>,
        connector: Arc<dyn ExecutionConnector>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let store = Store::open(&path)?;
        let log = EventLog::open(&path)?;
        Ok(Self {
            store,
            log,
            catalog,
            connector,
            sink,
            tenant_locks: Mutex::new(HashMap::new()),
            sweep_active: AtomicBool::new(false),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    fn tenant_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.tenant_locks.lock();
        locks
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn require_tenant(&self, tenant_id: &str) -> Result<TenantConfig> {
        self.store
            .tenant(tenant_id)?
            .ok_or_else(|| EngineError::UnknownTenant(tenant_id.to_string()))
    }

    fn require_incident(&self, incident_id: &str) -> Result<Incident> {
        self.store
            .incident(incident_id)?
            .ok_or_else(|| EngineError::UnknownIncident(incident_id.to_string()))
    }

    // ---- ingestion ----

    /// Append one raw alert. Correlation runs reactively when the tenant
    /// has auto-correlate enabled, otherwise it waits for the periodic
    /// trigger or an explicit run.
    pub fn ingest_alert(&self, alert: Alert, now: i64) -> Result<bool> {
        if alert.id.trim().is_empty()
            || alert.asset.trim().is_empty()
            || alert.signature.trim().is_empty()
        {
            return Err(EngineError::InvalidAlert(
                "id, asset, and signature are required".into(),
            ));
        }
        let cfg = self.require_tenant(&alert.tenant_id)?;
        let inserted = self.store.insert_alert(&alert)?;
        if inserted && cfg.auto_correlate {
            self.run_correlation(&alert.tenant_id, now)?;
        }
        Ok(inserted)
    }

    // ---- correlation ----

    pub fn run_correlation(&self, tenant_id: &str, now: i64) -> Result<CorrelationOutcome> {
        let cfg = self.require_tenant(tenant_id)?;
        let lock = self.tenant_lock(tenant_id);
        let _guard = lock.lock();
        correlation::correlate(&self.store, &self.log, &cfg, now)
    }

    // ---- decisions ----

    /// Decide one incident. The decision is recorded exactly once; calling
    /// again returns the existing record unless a human rejected the
    /// recommendation, in which case a re-run replaces it.
    pub fn run_decision(&self, incident_id: &str, now: i64) -> Result<Decision> {
        let incident = self.require_incident(incident_id)?;
        let cfg = self.require_tenant(&incident.tenant_id)?;
        let lock = self.tenant_lock(&incident.tenant_id);
        let _guard = lock.lock();

        // Reload under the lock; a concurrent call may have decided already.
        let mut incident = self.require_incident(incident_id)?;
        if let Some(existing) = self.store.decision(incident_id)? {
            if existing.outcome != Some(DecisionOutcome::Rejected) {
                return Ok(existing);
            }
        }

        // Refresh the age-dependent score so the snapshot is current.
        incident.priority_score = scoring::score(
            incident.severity,
            cfg.is_critical_asset(&incident.asset),
            incident.alert_count,
            incident.tool_sources.len(),
            incident.created_at,
            now,
        );
        self.store
            .set_priority(incident_id, incident.priority_score)?;

        // An unreachable catalog must not block the pipeline; it degrades
        // to the no-runbook escalation path.
        let runbook = match self.catalog.find_for(&incident.signature, &incident.category) {
            Ok(runbook) => runbook,
            Err(err) => {
                warn!(
                    incident_id = %incident.id,
                    error = %err,
                    "runbook catalog unreachable, treating as no applicable runbook"
                );
                None
            }
        };

        let recorded = decision::evaluate(&incident, runbook, cfg.auto_approve, now);
        self.store.upsert_decision(&recorded)?;
        self.store.set_decided_at(incident_id, now)?;
        self.log.record(
            incident_id,
            EventType::DecisionRecorded,
            format!(
                "decision: {} ({})",
                recorded.recommended_action.as_str(),
                recorded.reason
            ),
            Some(serde_json::json!({
                "recommended_action": recorded.recommended_action.as_str(),
                "runbook_id": recorded.runbook_id,
                "can_auto_execute": recorded.can_auto_execute,
                "priority_score": recorded.priority_score,
            })),
            now,
        )?;
        info!(
            incident_id = %incident.id,
            action = recorded.recommended_action.as_str(),
            can_auto_execute = recorded.can_auto_execute,
            "decision recorded"
        );

        match recorded.recommended_action {
            RecommendedAction::Execute if recorded.can_auto_execute => {
                self.start_execution(&incident, &recorded, now)?;
            }
            RecommendedAction::Execute => {
                // Surfaced for human approval; the SLA clock runs from
                // decided_at until someone acts.
            }
            RecommendedAction::Escalate => {
                self.escalate_and_route(&incident, EscalationReason::NoRunbook, now)?;
            }
        }

        self.store
            .decision(incident_id)?
            .ok_or_else(|| EngineError::NoDecision(incident_id.to_string()))
    }

    /// Decide every undecided incident for a tenant, refreshing open
    /// incidents' age-dependent scores first.
    pub fn run_decide_sweep(&self, tenant_id: &str, now: i64) -> Result<usize> {
        let cfg = self.require_tenant(tenant_id)?;
        if !cfg.auto_decide {
            return Ok(0);
        }
        {
            let lock = self.tenant_lock(tenant_id);
            let _guard = lock.lock();
            for incident in self.store.open_incidents(tenant_id)? {
                let score = scoring::score(
                    incident.severity,
                    cfg.is_critical_asset(&incident.asset),
                    incident.alert_count,
                    incident.tool_sources.len(),
                    incident.created_at,
                    now,
                );
                self.store.set_priority(&incident.id, score)?;
            }
        }

        let pending = self.store.undecided_incidents(tenant_id)?;
        let decided = pending.len();
        for incident in pending {
            self.run_decision(&incident.id, now)?;
        }
        Ok(decided)
    }

    // ---- approvals and overrides ----

    /// Human approval of a surfaced execute recommendation: submits the
    /// runbook to the connector.
    pub fn approve(&self, incident_id: &str, now: i64) -> Result<Decision> {
        let incident = self.require_incident(incident_id)?;
        let lock = self.tenant_lock(&incident.tenant_id);
        let _guard = lock.lock();

        // Reload under the lock so a concurrent approval is visible.
        let incident = self.require_incident(incident_id)?;
        if incident.status == IncidentStatus::Executing {
            return Err(EngineError::InvalidAction(
                incident_id.to_string(),
                "an execution is already in flight".into(),
            ));
        }
        let decision = self
            .store
            .decision(incident_id)?
            .ok_or_else(|| EngineError::NoDecision(incident_id.to_string()))?;
        if decision.recommended_action != RecommendedAction::Execute
            || decision.runbook_id.is_none()
        {
            return Err(EngineError::InvalidAction(
                incident_id.to_string(),
                "decision has no executable runbook to approve".into(),
            ));
        }
        if matches!(
            decision.outcome,
            Some(DecisionOutcome::Executed) | Some(DecisionOutcome::Approved)
        ) {
            return Err(EngineError::InvalidAction(
                incident_id.to_string(),
                "decision was already acted on".into(),
            ));
        }

        self.store
            .set_decision_outcome(incident_id, DecisionOutcome::Approved)?;
        self.start_execution(&incident, &decision, now)?;
        self.store
            .decision(incident_id)?
            .ok_or_else(|| EngineError::NoDecision(incident_id.to_string()))
    }

    /// Human rejection: the recommendation falls through to escalation.
    pub fn reject(&self, incident_id: &str, now: i64) -> Result<()> {
        let incident = self.require_incident(incident_id)?;
        let lock = self.tenant_lock(&incident.tenant_id);
        let _guard = lock.lock();

        if self.store.decision(incident_id)?.is_none() {
            return Err(EngineError::NoDecision(incident_id.to_string()));
        }
        self.store
            .set_decision_outcome(incident_id, DecisionOutcome::Rejected)?;
        self.escalate_and_route(&incident, EscalationReason::ApprovalDenied, now)
    }

    /// Manual override: short-circuit to escalation regardless of what the
    /// decision engine recommended.
    pub fn escalate_manual(&self, incident_id: &str, now: i64) -> Result<()> {
        let incident = self.require_incident(incident_id)?;
        let lock = self.tenant_lock(&incident.tenant_id);
        let _guard = lock.lock();
        self.escalate_and_route(&incident, EscalationReason::ManualOverride, now)
    }

    pub fn resolve(&self, incident_id: &str, now: i64) -> Result<()> {
        let incident = self.require_incident(incident_id)?;
        let lock = self.tenant_lock(&incident.tenant_id);
        let _guard = lock.lock();

        self.store.set_status(incident_id, IncidentStatus::Resolved)?;
        self.store.resolve_alerts_for_incident(incident_id)?;
        self.log.record(
            incident_id,
            EventType::Resolved,
            "incident resolved",
            None,
            now,
        )?;
        assignment::release(&self.store, &self.log, self.sink.as_ref(), incident_id, now)?;
        info!(incident_id = %incident.id, "incident resolved");
        Ok(())
    }

    // ---- execution lifecycle ----

    fn start_execution(&self, incident: &Incident, decision: &Decision, now: i64) -> Result<()> {
        let Some(runbook_id) = decision.runbook_id.clone() else {
            return Err(EngineError::InvalidAction(
                incident.id.clone(),
                "cannot execute a decision without a runbook".into(),
            ));
        };
        let request = ExecutionRequest {
            incident_id: incident.id.clone(),
            runbook_id: runbook_id.clone(),
            target_ids: vec![incident.asset.clone()],
        };
        match self.connector.submit(&request) {
            Ok(handle) => {
                self.store.insert_execution(&Execution {
                    handle: handle.clone(),
                    incident_id: incident.id.clone(),
                    runbook_id,
                    tenant_id: incident.tenant_id.clone(),
                    submitted_at: now,
                    status: ExecutionStatus::Pending,
                    duration_secs: None,
                })?;
                self.store
                    .set_status(&incident.id, IncidentStatus::Executing)?;
                self.log.record(
                    &incident.id,
                    EventType::ExecutionStarted,
                    format!("runbook {} submitted", request.runbook_id),
                    Some(serde_json::json!({
                        "handle": handle,
                        "runbook_id": request.runbook_id,
                        "target_ids": request.target_ids,
                    })),
                    now,
                )?;
                info!(
                    incident_id = %incident.id,
                    handle = %handle,
                    runbook_id = %request.runbook_id,
                    "runbook execution submitted"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    incident_id = %incident.id,
                    error = %err,
                    "runbook submission failed"
                );
                self.log.record(
                    &incident.id,
                    EventType::ExecutionFailed,
                    format!("runbook {} submission failed", request.runbook_id),
                    Some(serde_json::json!({
                        "runbook_id": request.runbook_id,
                        "error": err.to_string(),
                    })),
                    now,
                )?;
                self.escalate_and_route(incident, EscalationReason::RemediationFailed, now)
            }
        }
    }

    /// Completion callback from the execution connector. Results for a
    /// deleted tenant are recorded on the execution row and otherwise
    /// discarded.
    pub fn complete_execution(
        &self,
        handle: &str,
        success: bool,
        duration_secs: Option<i64>,
        now: i64,
    ) -> Result<()> {
        let execution = self
            .store
            .execution(handle)?
            .ok_or_else(|| EngineError::UnknownExecution(handle.to_string()))?;
        let status = if success {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure
        };

        if self.store.tenant(&execution.tenant_id)?.is_none() {
            warn!(
                handle = %handle,
                tenant_id = %execution.tenant_id,
                "discarding execution result for deleted tenant"
            );
            self.store.complete_execution(handle, status, duration_secs)?;
            return Ok(());
        }

        let lock = self.tenant_lock(&execution.tenant_id);
        let _guard = lock.lock();

        // Duplicate callbacks lose the pending-state CAS and no-op.
        if !self.store.complete_execution(handle, status, duration_secs)? {
            return Ok(());
        }
        let incident = self.require_incident(&execution.incident_id)?;

        if success {
            self.store
                .set_status(&incident.id, IncidentStatus::Resolved)?;
            self.store
                .set_decision_outcome(&incident.id, DecisionOutcome::Executed)?;
            self.store.resolve_alerts_for_incident(&incident.id)?;
            self.log.record(
                &incident.id,
                EventType::ExecutionSucceeded,
                format!("runbook {} succeeded", execution.runbook_id),
                Some(serde_json::json!({
                    "handle": handle,
                    "duration_secs": duration_secs,
                })),
                now,
            )?;
            assignment::release(&self.store, &self.log, self.sink.as_ref(), &incident.id, now)?;
            info!(
                incident_id = %incident.id,
                handle = %handle,
                "remediation succeeded, incident resolved"
            );
        } else {
            self.log.record(
                &incident.id,
                EventType::ExecutionFailed,
                format!("runbook {} failed", execution.runbook_id),
                Some(serde_json::json!({
                    "handle": handle,
                    "duration_secs": duration_secs,
                })),
                now,
            )?;
            self.escalate_and_route(&incident, EscalationReason::RemediationFailed, now)?;
        }
        Ok(())
    }

    // ---- escalation ----

    fn escalate_and_route(
        &self,
        incident: &Incident,
        reason: EscalationReason,
        now: i64,
    ) -> Result<()> {
        if !escalation::escalate(
            &self.store,
            &self.log,
            self.sink.as_ref(),
            incident,
            reason,
            now,
        )? {
            return Ok(());
        }
        // Escalation hands the incident to a human: route it.
        let incident = self.require_incident(&incident.id)?;
        let cfg = self.require_tenant(&incident.tenant_id)?;
        let category = assignment::routing_category(&self.store, &incident)?;
        assignment::assign(
            &self.store,
            &self.log,
            self.sink.as_ref(),
            &incident,
            &category,
            cfg.assignment_strategy,
            now,
        )?;
        Ok(())
    }

    /// The global SLA sweep. Reentrancy-guarded: a sweep that outlives the
    /// tick interval makes the next tick a no-op.
    pub fn sweep_escalations(&self, now: i64) -> Result<SweepOutcome> {
        escalation::sweep(
            &self.store,
            &self.log,
            self.sink.as_ref(),
            &self.sweep_active,
            now,
        )
    }

    // ---- assignment surface ----

    /// Route one incident to a technician (used after a decision recommends
    /// a human, and by tests); most callers go through the decision paths.
    pub fn assign_incident(&self, incident_id: &str, now: i64) -> Result<AssignOutcome> {
        let incident = self.require_incident(incident_id)?;
        let cfg = self.require_tenant(&incident.tenant_id)?;
        let lock = self.tenant_lock(&incident.tenant_id);
        let _guard = lock.lock();
        let incident = self.require_incident(incident_id)?;
        let category = assignment::routing_category(&self.store, &incident)?;
        assignment::assign(
            &self.store,
            &self.log,
            self.sink.as_ref(),
            &incident,
            &category,
            cfg.assignment_strategy,
            now,
        )
    }

    pub fn add_technician(&self, technician: &Technician) -> Result<()> {
        self.store.upsert_technician(technician)
    }

    /// Availability flips drain the overflow queue when capacity appears.
    pub fn set_technician_availability(
        &self,
        technician_id: &str,
        available: bool,
        now: i64,
    ) -> Result<()> {
        if !self
            .store
            .set_technician_availability(technician_id, available)?
        {
            return Err(EngineError::UnknownTechnician(technician_id.to_string()));
        }
        if available {
            assignment::drain_queue(&self.store, &self.log, self.sink.as_ref(), now)?;
        }
        Ok(())
    }

    // ---- tenant lifecycle ----

    pub fn upsert_tenant(&self, cfg: &TenantConfig) -> Result<()> {
        self.store.upsert_tenant(cfg)
    }

    /// Deleting a tenant removes it from every periodic loop and releases
    /// its queued assignments. In-flight executions are not cancelled;
    /// their results are discarded on arrival.
    pub fn delete_tenant(&self, tenant_id: &str) -> Result<bool> {
        let lock = self.tenant_lock(tenant_id);
        let _guard = lock.lock();
        let deleted = self.store.delete_tenant(tenant_id)?;
        if deleted {
            info!(tenant_id = %tenant_id, "tenant deleted");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SimulatedConnector;
    use crate::model::{AlertStatus, Severity};
    use crate::notify::RecordingSink;
    use crate::runbooks::StaticCatalog;

    fn db_path(name: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        format!("/tmp/triage-tests/{name}-{nanos}.db")
    }

    fn engine(name: &str) -> (Engine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let engine = Engine::open(
            db_path(name),
            Arc::new(StaticCatalog::builtin()),
            Arc::new(SimulatedConnector),
            sink.clone(),
        )
        .expect("engine");
        engine
            .upsert_tenant(&TenantConfig::new("t1", "key-1"))
            .expect("tenant");
        (engine, sink)
    }

    fn alert(id: &str, signature: &str, severity: Severity, received_at: i64) -> Alert {
        Alert {
            id: id.into(),
            tenant_id: "t1".into(),
            asset: "web-01".into(),
            signature: signature.into(),
            severity,
            message: String::new(),
            source: "datadog".into(),
            status: AlertStatus::Active,
            incident_id: None,
            received_at,
            archived: false,
        }
    }

    fn sole_incident(engine: &Engine) -> Incident {
        let incidents = engine.store().incidents_for_tenant("t1").expect("incidents");
        assert_eq!(incidents.len(), 1);
        incidents.into_iter().next().expect("incident")
    }

    #[test]
    fn decision_is_recorded_exactly_once() {
        let (engine, _) = engine("eng-decide-once");
        engine
            .ingest_alert(alert("a1", "queue_backlog", Severity::High, 100), 100)
            .expect("ingest");
        let incident = sole_incident(&engine);

        let first = engine.run_decision(&incident.id, 200).expect("first");
        let second = engine.run_decision(&incident.id, 500).expect("second");
        assert_eq!(first.created_at, second.created_at, "decision re-recorded");
    }

    #[test]
    fn rejected_decision_allows_a_rerun() {
        let (engine, _) = engine("eng-rerun");
        engine
            .ingest_alert(alert("a1", "queue_backlog", Severity::High, 100), 100)
            .expect("ingest");
        let incident = sole_incident(&engine);

        let first = engine.run_decision(&incident.id, 200).expect("first");
        assert!(!first.can_auto_execute, "medium risk requires approval");
        engine.reject(&incident.id, 300).expect("reject");

        let rerun = engine.run_decision(&incident.id, 400).expect("rerun");
        assert_eq!(rerun.created_at, 400, "rejection unlocks a fresh decision");
    }

    #[test]
    fn approve_submits_and_completion_resolves() {
        let (engine, _) = engine("eng-approve");
        engine
            .ingest_alert(alert("a1", "queue_backlog", Severity::High, 100), 100)
            .expect("ingest");
        let incident = sole_incident(&engine);

        engine.run_decision(&incident.id, 200).expect("decide");
        engine.approve(&incident.id, 300).expect("approve");

        let refreshed = engine.store().incident(&incident.id).expect("get").expect("incident");
        assert_eq!(refreshed.status, IncidentStatus::Executing);

        // Find the pending handle via the decision's runbook.
        let decision = engine.store().decision(&incident.id).expect("get").expect("decision");
        assert_eq!(decision.outcome, Some(DecisionOutcome::Approved));

        // Double approval is refused.
        assert!(engine.approve(&incident.id, 310).is_err());
    }

    #[test]
    fn rejecting_escalates_with_approval_denied() {
        let (engine, sink) = engine("eng-reject");
        engine
            .ingest_alert(alert("a1", "queue_backlog", Severity::High, 100), 100)
            .expect("ingest");
        let incident = sole_incident(&engine);

        engine.run_decision(&incident.id, 200).expect("decide");
        engine.reject(&incident.id, 300).expect("reject");

        let refreshed = engine.store().incident(&incident.id).expect("get").expect("incident");
        assert!(refreshed.escalated);
        assert_eq!(
            refreshed.escalation_reason,
            Some(EscalationReason::ApprovalDenied)
        );
        let records = engine.store().escalations_for(&incident.id).expect("records");
        assert_eq!(records.len(), 1);
        assert!(sink
            .sent()
            .iter()
            .any(|n| n.kind == crate::notify::NotificationKind::Escalated));
    }

    #[test]
    fn manual_override_short_circuits_any_recommendation() {
        let (engine, _) = engine("eng-override");
        engine
            .ingest_alert(alert("a1", "disk_full", Severity::High, 100), 100)
            .expect("ingest");
        let incident = sole_incident(&engine);

        engine.escalate_manual(&incident.id, 200).expect("override");
        let refreshed = engine.store().incident(&incident.id).expect("get").expect("incident");
        assert!(refreshed.escalated);
        assert_eq!(
            refreshed.escalation_reason,
            Some(EscalationReason::ManualOverride)
        );
    }

    #[test]
    fn completion_for_deleted_tenant_is_discarded() {
        let (engine, _) = engine("eng-deleted-tenant");
        engine
            .ingest_alert(alert("a1", "disk_full", Severity::High, 100), 100)
            .expect("ingest");
        let incident = sole_incident(&engine);

        // Auto-executes: disk_full matches a low-risk runbook.
        engine.run_decision(&incident.id, 200).expect("decide");
        let executing = engine.store().incident(&incident.id).expect("get").expect("incident");
        assert_eq!(executing.status, IncidentStatus::Executing);

        engine.delete_tenant("t1").expect("delete");

        // The callback arrives after deletion: recorded, but the incident
        // is left untouched.
        let events_before = engine.event_log().latest_event_id().expect("latest");
        let handle = engine
            .store()
            .execution_for_incident(&incident.id)
            .expect("exec")
            .expect("row")
            .handle;
        engine
            .complete_execution(&handle, true, Some(5), 400)
            .expect("complete");

        let after = engine.store().incident(&incident.id).expect("get").expect("incident");
        assert_eq!(after.status, IncidentStatus::Executing, "result discarded");
        assert_eq!(
            engine.event_log().latest_event_id().expect("latest"),
            events_before,
            "no pipeline events for a deleted tenant"
        );
    }

    #[test]
    fn decide_sweep_covers_all_undecided_incidents() {
        let (engine, _) = engine("eng-sweep");
        engine
            .ingest_alert(alert("a1", "disk_full", Severity::High, 100), 100)
            .expect("a1");
        engine
            .ingest_alert(alert("a2", "malware_detected", Severity::Critical, 100), 100)
            .expect("a2");

        let decided = engine.run_decide_sweep("t1", 200).expect("sweep");
        assert_eq!(decided, 2);

        // disk_full auto-executed; malware had no runbook and escalated.
        let incidents = engine.store().incidents_for_tenant("t1").expect("incidents");
        let statuses: Vec<IncidentStatus> = incidents.iter().map(|i| i.status).collect();
        assert!(statuses.contains(&IncidentStatus::Executing));
        assert!(statuses.contains(&IncidentStatus::Escalated));
    }
}
