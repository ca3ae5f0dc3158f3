//! SQLite persistence for every engine record, plus the conditional-update
//! primitives the concurrency model relies on: assignment is one
//! transaction pairing the incident's `assigned_to` compare-and-swap with
//! the technician's workload counter, and escalation flips the `escalated`
//! flag with a guarded UPDATE so a double-fire is a no-op.

use crate::config::TenantConfig;
use crate::error::Result;
use crate::model::{
    Alert, AlertStatus, AssignmentStrategy, Decision, DecisionOutcome, EscalationReason,
    EscalationRecord, Execution, ExecutionStatus, Incident, IncidentStatus, QueueEntry,
    RecommendedAction, Severity, Technician,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct Store {
    db_path: Arc<PathBuf>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                asset TEXT NOT NULL,
                signature TEXT NOT NULL,
                severity TEXT NOT NULL,
                message TEXT NOT NULL,
                source TEXT NOT NULL,
                status TEXT NOT NULL,
                incident_id TEXT,
                received_at INTEGER NOT NULL,
                archived INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (tenant_id, id)
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_unattached
                ON alerts(tenant_id, status, incident_id);
            CREATE INDEX IF NOT EXISTS idx_alerts_incident
                ON alerts(incident_id);
            CREATE TABLE IF NOT EXISTS incidents (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                asset TEXT NOT NULL,
                signature TEXT NOT NULL,
                severity TEXT NOT NULL,
                category TEXT NOT NULL,
                priority_score REAL NOT NULL DEFAULT 0,
                alert_count INTEGER NOT NULL DEFAULT 0,
                tool_sources TEXT NOT NULL,
                status TEXT NOT NULL,
                assigned_to TEXT,
                escalated INTEGER NOT NULL DEFAULT 0,
                escalated_at INTEGER,
                escalation_reason TEXT,
                created_at INTEGER NOT NULL,
                decided_at INTEGER,
                assigned_at INTEGER,
                window_expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_incidents_grouping
                ON incidents(tenant_id, asset, signature, status);
            CREATE INDEX IF NOT EXISTS idx_incidents_tenant_status
                ON incidents(tenant_id, status);
            CREATE TABLE IF NOT EXISTS decisions (
                incident_id TEXT PRIMARY KEY,
                recommended_action TEXT NOT NULL,
                runbook_id TEXT,
                technician_category TEXT,
                priority_score REAL NOT NULL,
                reason TEXT NOT NULL,
                can_auto_execute INTEGER NOT NULL,
                outcome TEXT,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS technicians (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                skills TEXT NOT NULL,
                workload INTEGER NOT NULL DEFAULT 0,
                available INTEGER NOT NULL DEFAULT 1,
                last_assigned_at INTEGER
            );
            CREATE TABLE IF NOT EXISTS assignment_queue (
                incident_id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                priority_score REAL NOT NULL,
                enqueued_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS escalations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                incident_id TEXT NOT NULL,
                triggered_at INTEGER NOT NULL,
                trigger_reason TEXT NOT NULL,
                previous_assignee TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_escalations_incident
                ON escalations(incident_id);
            CREATE TABLE IF NOT EXISTS executions (
                handle TEXT PRIMARY KEY,
                incident_id TEXT NOT NULL,
                runbook_id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                submitted_at INTEGER NOT NULL,
                status TEXT NOT NULL,
                duration_secs INTEGER
            );
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                api_key TEXT NOT NULL,
                auto_correlate INTEGER NOT NULL,
                window_minutes INTEGER NOT NULL,
                auto_decide INTEGER NOT NULL,
                decide_interval_secs INTEGER NOT NULL,
                sla_minutes INTEGER NOT NULL,
                auto_approve INTEGER NOT NULL,
                assignment_strategy TEXT NOT NULL,
                critical_assets TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tenants_api_key
                ON tenants(api_key);
            ",
        )?;

        Ok(Self {
            db_path: Arc::new(db_path),
        })
    }

    fn conn(&self) -> Result<Connection> {
        Ok(Connection::open(&*self.db_path)?)
    }

    // ---- alerts ----

    /// Idempotent: webhook redelivery of the same (tenant, id) is ignored.
    pub fn insert_alert(&self, alert: &Alert) -> Result<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO alerts
             (id, tenant_id, asset, signature, severity, message, source, status,
              incident_id, received_at, archived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                alert.id,
                alert.tenant_id,
                alert.asset,
                alert.signature,
                alert.severity.as_str(),
                alert.message,
                alert.source,
                alert.status.as_str(),
                alert.incident_id,
                alert.received_at,
                alert.archived,
            ],
        )?;
        Ok(inserted == 1)
    }

    pub fn alert(&self, tenant_id: &str, id: &str) -> Result<Option<Alert>> {
        let conn = self.conn()?;
        let alert = conn
            .query_row(
                &format!("{ALERT_COLUMNS} WHERE tenant_id = ?1 AND id = ?2"),
                params![tenant_id, id],
                map_alert,
            )
            .optional()?;
        Ok(alert)
    }

    /// Unresolved alerts not yet bound to an incident, oldest first. The
    /// correlation sweep's working set; already-bound alerts are skipped,
    /// which is what makes re-running the sweep idempotent.
    pub fn unattached_active_alerts(&self, tenant_id: &str) -> Result<Vec<Alert>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{ALERT_COLUMNS}
             WHERE tenant_id = ?1 AND incident_id IS NULL
               AND status != 'resolved' AND archived = 0
             ORDER BY received_at ASC, id ASC"
        ))?;
        let rows = stmt.query_map(params![tenant_id], map_alert)?;
        collect(rows)
    }

    /// Bind an alert to an incident. CAS on `incident_id IS NULL`: the
    /// losing side of a correlation race sees `false` and moves on.
    pub fn attach_alert(&self, tenant_id: &str, alert_id: &str, incident_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE alerts SET incident_id = ?3
             WHERE tenant_id = ?1 AND id = ?2 AND incident_id IS NULL",
            params![tenant_id, alert_id, incident_id],
        )?;
        Ok(changed == 1)
    }

    pub fn set_alert_status(&self, tenant_id: &str, alert_id: &str, status: AlertStatus) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE alerts SET status = ?3 WHERE tenant_id = ?1 AND id = ?2",
            params![tenant_id, alert_id, status.as_str()],
        )?;
        Ok(changed == 1)
    }

    pub fn resolve_alerts_for_incident(&self, incident_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE alerts SET status = 'resolved' WHERE incident_id = ?1",
            params![incident_id],
        )?;
        Ok(changed)
    }

    /// Alerts are never deleted; resolved ones older than the horizon are
    /// flagged out of every query path instead.
    pub fn archive_resolved_alerts(&self, tenant_id: &str, before: i64) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE alerts SET archived = 1
             WHERE tenant_id = ?1 AND status = 'resolved' AND archived = 0
               AND received_at < ?2",
            params![tenant_id, before],
        )?;
        Ok(changed)
    }

    pub fn count_alerts(&self, tenant_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM alerts WHERE tenant_id = ?1 AND archived = 0",
            params![tenant_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ---- incidents ----

    pub fn insert_incident(&self, incident: &Incident) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO incidents
             (id, tenant_id, asset, signature, severity, category, priority_score,
              alert_count, tool_sources, status, assigned_to, escalated, escalated_at,
              escalation_reason, created_at, decided_at, assigned_at, window_expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                incident.id,
                incident.tenant_id,
                incident.asset,
                incident.signature,
                incident.severity.as_str(),
                incident.category,
                incident.priority_score,
                incident.alert_count,
                serde_json::to_string(&incident.tool_sources)?,
                incident.status.as_str(),
                incident.assigned_to,
                incident.escalated,
                incident.escalated_at,
                incident.escalation_reason.map(|r| r.as_str()),
                incident.created_at,
                incident.decided_at,
                incident.assigned_at,
                incident.window_expires_at,
            ],
        )?;
        Ok(())
    }

    pub fn incident(&self, id: &str) -> Result<Option<Incident>> {
        let conn = self.conn()?;
        let incident = conn
            .query_row(
                &format!("{INCIDENT_COLUMNS} WHERE id = ?1"),
                params![id],
                map_incident,
            )
            .optional()?;
        Ok(incident)
    }

    /// The open incident for a grouping key, if its membership window is
    /// still accepting. Resolved and escalated incidents are immutable for
    /// membership purposes, as are those whose window has elapsed.
    pub fn find_open_incident(
        &self,
        tenant_id: &str,
        asset: &str,
        signature: &str,
        now: i64,
    ) -> Result<Option<Incident>> {
        let conn = self.conn()?;
        let incident = conn
            .query_row(
                &format!(
                    "{INCIDENT_COLUMNS}
                     WHERE tenant_id = ?1 AND asset = ?2 AND signature = ?3
                       AND status NOT IN ('resolved', 'escalated')
                       AND window_expires_at > ?4
                     ORDER BY created_at DESC
                     LIMIT 1"
                ),
                params![tenant_id, asset, signature, now],
                map_incident,
            )
            .optional()?;
        Ok(incident)
    }

    /// Persist the membership-derived fields after an alert attaches.
    pub fn update_membership(&self, incident: &Incident) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE incidents SET severity = ?2, alert_count = ?3, tool_sources = ?4,
                    priority_score = ?5, window_expires_at = ?6
             WHERE id = ?1",
            params![
                incident.id,
                incident.severity.as_str(),
                incident.alert_count,
                serde_json::to_string(&incident.tool_sources)?,
                incident.priority_score,
                incident.window_expires_at,
            ],
        )?;
        Ok(())
    }

    pub fn set_priority(&self, incident_id: &str, score: f64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE incidents SET priority_score = ?2 WHERE id = ?1",
            params![incident_id, score],
        )?;
        Ok(())
    }

    pub fn set_status(&self, incident_id: &str, status: IncidentStatus) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE incidents SET status = ?2 WHERE id = ?1",
            params![incident_id, status.as_str()],
        )?;
        Ok(())
    }

    pub fn set_decided_at(&self, incident_id: &str, now: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE incidents SET decided_at = ?2 WHERE id = ?1",
            params![incident_id, now],
        )?;
        Ok(())
    }

    pub fn incidents_for_tenant(&self, tenant_id: &str) -> Result<Vec<Incident>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{INCIDENT_COLUMNS} WHERE tenant_id = ?1 ORDER BY priority_score DESC, created_at ASC"
        ))?;
        let rows = stmt.query_map(params![tenant_id], map_incident)?;
        collect(rows)
    }

    /// Unresolved incidents whose age-dependent score should be refreshed.
    pub fn open_incidents(&self, tenant_id: &str) -> Result<Vec<Incident>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{INCIDENT_COLUMNS}
             WHERE tenant_id = ?1 AND status != 'resolved'
             ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(params![tenant_id], map_incident)?;
        collect(rows)
    }

    /// Incidents awaiting a first decision.
    pub fn undecided_incidents(&self, tenant_id: &str) -> Result<Vec<Incident>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{INCIDENT_COLUMNS}
             WHERE tenant_id = ?1 AND status = 'new'
               AND id NOT IN (SELECT incident_id FROM decisions)
             ORDER BY priority_score DESC, created_at ASC"
        ))?;
        let rows = stmt.query_map(params![tenant_id], map_incident)?;
        collect(rows)
    }

    /// Incidents with an SLA clock running: assigned or executing, plus
    /// decided-but-unassigned ones still waiting on a human approval.
    pub fn sla_candidates(&self, tenant_id: &str) -> Result<Vec<Incident>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{INCIDENT_COLUMNS}
             WHERE tenant_id = ?1 AND escalated = 0
               AND (status IN ('assigned', 'executing')
                    OR (status = 'new' AND decided_at IS NOT NULL))
             ORDER BY created_at ASC"
        ))?;
        let rows = stmt.query_map(params![tenant_id], map_incident)?;
        collect(rows)
    }

    /// Exactly-once escalation: flips the flag only if it was clear. A
    /// sweep double-fire loses the CAS and must treat `false` as a no-op.
    pub fn mark_escalated(
        &self,
        incident_id: &str,
        reason: EscalationReason,
        now: i64,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE incidents
             SET escalated = 1, escalated_at = ?2, escalation_reason = ?3, status = 'escalated'
             WHERE id = ?1 AND escalated = 0",
            params![incident_id, now, reason.as_str()],
        )?;
        Ok(changed == 1)
    }

    /// Assign atomically: the incident's `assigned_to` CAS and the
    /// technician's workload increment commit together or not at all.
    pub fn assign_incident(
        &self,
        incident_id: &str,
        technician_id: &str,
        status: IncidentStatus,
        now: i64,
    ) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let claimed = tx.execute(
            "UPDATE incidents SET assigned_to = ?2, assigned_at = ?3, status = ?4
             WHERE id = ?1 AND assigned_to IS NULL",
            params![incident_id, technician_id, now, status.as_str()],
        )?;
        if claimed != 1 {
            return Ok(false);
        }
        let bumped = tx.execute(
            "UPDATE technicians SET workload = workload + 1, last_assigned_at = ?2
             WHERE id = ?1 AND available = 1",
            params![technician_id, now],
        )?;
        if bumped != 1 {
            // Technician vanished or went unavailable between selection and
            // commit; roll the claim back.
            return Ok(false);
        }
        tx.commit()?;
        Ok(true)
    }

    /// Clear the assignee and release their workload slot in one
    /// transaction. Returns the previous assignee, if any.
    pub fn clear_assignee(&self, incident_id: &str) -> Result<Option<String>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let previous: Option<String> = tx
            .query_row(
                "SELECT assigned_to FROM incidents WHERE id = ?1",
                params![incident_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        let Some(technician_id) = previous else {
            return Ok(None);
        };
        tx.execute(
            "UPDATE incidents SET assigned_to = NULL WHERE id = ?1",
            params![incident_id],
        )?;
        tx.execute(
            "UPDATE technicians SET workload = MAX(workload - 1, 0) WHERE id = ?1",
            params![technician_id],
        )?;
        tx.commit()?;
        Ok(Some(technician_id))
    }

    pub fn count_assigned_to(&self, technician_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM incidents WHERE assigned_to = ?1",
            params![technician_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // ---- decisions ----

    /// Exactly one decision row per incident; an explicit re-run replaces
    /// the prior record rather than appending.
    pub fn upsert_decision(&self, decision: &Decision) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO decisions
             (incident_id, recommended_action, runbook_id, technician_category,
              priority_score, reason, can_auto_execute, outcome, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                decision.incident_id,
                decision.recommended_action.as_str(),
                decision.runbook_id,
                decision.technician_category,
                decision.priority_score,
                decision.reason,
                decision.can_auto_execute,
                decision.outcome.map(|o| o.as_str()),
                decision.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn decision(&self, incident_id: &str) -> Result<Option<Decision>> {
        let conn = self.conn()?;
        let decision = conn
            .query_row(
                "SELECT incident_id, recommended_action, runbook_id, technician_category,
                        priority_score, reason, can_auto_execute, outcome, created_at
                 FROM decisions WHERE incident_id = ?1",
                params![incident_id],
                map_decision,
            )
            .optional()?;
        Ok(decision)
    }

    pub fn set_decision_outcome(
        &self,
        incident_id: &str,
        outcome: DecisionOutcome,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE decisions SET outcome = ?2 WHERE incident_id = ?1",
            params![incident_id, outcome.as_str()],
        )?;
        Ok(changed == 1)
    }

    // ---- technicians ----

    pub fn upsert_technician(&self, technician: &Technician) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO technicians
             (id, name, skills, workload, available, last_assigned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                technician.id,
                technician.name,
                serde_json::to_string(&technician.skills)?,
                technician.workload,
                technician.available,
                technician.last_assigned_at,
            ],
        )?;
        Ok(())
    }

    pub fn technician(&self, id: &str) -> Result<Option<Technician>> {
        let conn = self.conn()?;
        let technician = conn
            .query_row(
                "SELECT id, name, skills, workload, available, last_assigned_at
                 FROM technicians WHERE id = ?1",
                params![id],
                map_technician,
            )
            .optional()?;
        Ok(technician)
    }

    pub fn available_technicians(&self) -> Result<Vec<Technician>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, skills, workload, available, last_assigned_at
             FROM technicians WHERE available = 1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], map_technician)?;
        collect(rows)
    }

    pub fn set_technician_availability(&self, id: &str, available: bool) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE technicians SET available = ?2 WHERE id = ?1",
            params![id, available],
        )?;
        Ok(changed == 1)
    }

    // ---- assignment queue ----

    pub fn enqueue(&self, entry: &QueueEntry) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO assignment_queue
             (incident_id, tenant_id, priority_score, enqueued_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.incident_id,
                entry.tenant_id,
                entry.priority_score,
                entry.enqueued_at,
            ],
        )?;
        Ok(())
    }

    /// Drain order: highest priority first, oldest first among equals.
    pub fn queued_entries(&self) -> Result<Vec<QueueEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT incident_id, tenant_id, priority_score, enqueued_at
             FROM assignment_queue
             ORDER BY priority_score DESC, enqueued_at ASC, incident_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(QueueEntry {
                incident_id: row.get(0)?,
                tenant_id: row.get(1)?,
                priority_score: row.get(2)?,
                enqueued_at: row.get(3)?,
            })
        })?;
        collect(rows)
    }

    pub fn dequeue(&self, incident_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM assignment_queue WHERE incident_id = ?1",
            params![incident_id],
        )?;
        Ok(changed == 1)
    }

    // ---- escalation records ----

    pub fn insert_escalation(&self, record: &EscalationRecord) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO escalations (incident_id, triggered_at, trigger_reason, previous_assignee)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.incident_id,
                record.triggered_at,
                record.trigger_reason.as_str(),
                record.previous_assignee,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn escalations_for(&self, incident_id: &str) -> Result<Vec<EscalationRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, incident_id, triggered_at, trigger_reason, previous_assignee
             FROM escalations WHERE incident_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![incident_id], |row| {
            let reason: String = row.get(3)?;
            Ok(EscalationRecord {
                id: row.get(0)?,
                incident_id: row.get(1)?,
                triggered_at: row.get(2)?,
                trigger_reason: EscalationReason::parse(&reason).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        format!("unknown escalation reason '{reason}'").into(),
                    )
                })?,
                previous_assignee: row.get(4)?,
            })
        })?;
        collect(rows)
    }

    // ---- executions ----

    pub fn insert_execution(&self, execution: &Execution) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO executions
             (handle, incident_id, runbook_id, tenant_id, submitted_at, status, duration_secs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                execution.handle,
                execution.incident_id,
                execution.runbook_id,
                execution.tenant_id,
                execution.submitted_at,
                execution.status.as_str(),
                execution.duration_secs,
            ],
        )?;
        Ok(())
    }

    pub fn execution(&self, handle: &str) -> Result<Option<Execution>> {
        let conn = self.conn()?;
        let execution = conn
            .query_row(
                "SELECT handle, incident_id, runbook_id, tenant_id, submitted_at, status, duration_secs
                 FROM executions WHERE handle = ?1",
                params![handle],
                map_execution,
            )
            .optional()?;
        Ok(execution)
    }

    pub fn execution_for_incident(&self, incident_id: &str) -> Result<Option<Execution>> {
        let conn = self.conn()?;
        let execution = conn
            .query_row(
                "SELECT handle, incident_id, runbook_id, tenant_id, submitted_at, status, duration_secs
                 FROM executions WHERE incident_id = ?1
                 ORDER BY submitted_at DESC LIMIT 1",
                params![incident_id],
                map_execution,
            )
            .optional()?;
        Ok(execution)
    }

    /// Record a completion exactly once; a duplicate callback loses the
    /// pending-state CAS and reports `false`.
    pub fn complete_execution(
        &self,
        handle: &str,
        status: ExecutionStatus,
        duration_secs: Option<i64>,
    ) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE executions SET status = ?2, duration_secs = ?3
             WHERE handle = ?1 AND status = 'pending'",
            params![handle, status.as_str(), duration_secs],
        )?;
        Ok(changed == 1)
    }

    // ---- tenants ----

    pub fn upsert_tenant(&self, cfg: &TenantConfig) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO tenants
             (id, api_key, auto_correlate, window_minutes, auto_decide,
              decide_interval_secs, sla_minutes, auto_approve, assignment_strategy,
              critical_assets)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                cfg.tenant_id,
                cfg.api_key,
                cfg.auto_correlate,
                cfg.window_minutes,
                cfg.auto_decide,
                cfg.decide_interval_secs,
                cfg.sla_minutes,
                cfg.auto_approve,
                cfg.assignment_strategy.as_str(),
                serde_json::to_string(&cfg.critical_assets)?,
            ],
        )?;
        Ok(())
    }

    pub fn tenant(&self, id: &str) -> Result<Option<TenantConfig>> {
        let conn = self.conn()?;
        let tenant = conn
            .query_row(
                &format!("{TENANT_COLUMNS} WHERE id = ?1"),
                params![id],
                map_tenant,
            )
            .optional()?;
        Ok(tenant)
    }

    pub fn tenant_by_api_key(&self, api_key: &str) -> Result<Option<TenantConfig>> {
        let conn = self.conn()?;
        let tenant = conn
            .query_row(
                &format!("{TENANT_COLUMNS} WHERE api_key = ?1"),
                params![api_key],
                map_tenant,
            )
            .optional()?;
        Ok(tenant)
    }

    pub fn tenants(&self) -> Result<Vec<TenantConfig>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{TENANT_COLUMNS} ORDER BY id ASC"))?;
        let rows = stmt.query_map([], map_tenant)?;
        collect(rows)
    }

    /// Remove the tenant record and its queued assignments. Its incidents
    /// and alerts stay on disk for audit but drop out of every periodic
    /// loop, which iterates the tenant table.
    pub fn delete_tenant(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM assignment_queue WHERE tenant_id = ?1",
            params![id],
        )?;
        let deleted = tx.execute("DELETE FROM tenants WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(deleted == 1)
    }
}

const ALERT_COLUMNS: &str = "SELECT id, tenant_id, asset, signature, severity, message, source,
        status, incident_id, received_at, archived FROM alerts";

const INCIDENT_COLUMNS: &str = "SELECT id, tenant_id, asset, signature, severity, category,
        priority_score, alert_count, tool_sources, status, assigned_to, escalated,
        escalated_at, escalation_reason, created_at, decided_at, assigned_at,
        window_expires_at FROM incidents";

const TENANT_COLUMNS: &str = "SELECT id, api_key, auto_correlate, window_minutes, auto_decide,
        decide_interval_secs, sla_minutes, auto_approve, assignment_strategy,
        critical_assets FROM tenants";

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn text_conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, message.into())
}

fn map_alert(row: &rusqlite::Row<'_>) -> rusqlite::Result<Alert> {
    let severity: String = row.get(4)?;
    let status: String = row.get(7)?;
    Ok(Alert {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        asset: row.get(2)?,
        signature: row.get(3)?,
        severity: Severity::parse(&severity)
            .ok_or_else(|| text_conversion_error(4, format!("unknown severity '{severity}'")))?,
        message: row.get(5)?,
        source: row.get(6)?,
        status: AlertStatus::parse(&status)
            .ok_or_else(|| text_conversion_error(7, format!("unknown alert status '{status}'")))?,
        incident_id: row.get(8)?,
        received_at: row.get(9)?,
        archived: row.get(10)?,
    })
}

fn map_incident(row: &rusqlite::Row<'_>) -> rusqlite::Result<Incident> {
    let severity: String = row.get(4)?;
    let sources: String = row.get(8)?;
    let status: String = row.get(9)?;
    let reason: Option<String> = row.get(13)?;
    Ok(Incident {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        asset: row.get(2)?,
        signature: row.get(3)?,
        severity: Severity::parse(&severity)
            .ok_or_else(|| text_conversion_error(4, format!("unknown severity '{severity}'")))?,
        category: row.get(5)?,
        priority_score: row.get(6)?,
        alert_count: row.get(7)?,
        tool_sources: serde_json::from_str(&sources).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(err))
        })?,
        status: IncidentStatus::parse(&status).ok_or_else(|| {
            text_conversion_error(9, format!("unknown incident status '{status}'"))
        })?,
        assigned_to: row.get(10)?,
        escalated: row.get(11)?,
        escalated_at: row.get(12)?,
        escalation_reason: reason
            .map(|r| {
                EscalationReason::parse(&r).ok_or_else(|| {
                    text_conversion_error(13, format!("unknown escalation reason '{r}'"))
                })
            })
            .transpose()?,
        created_at: row.get(14)?,
        decided_at: row.get(15)?,
        assigned_at: row.get(16)?,
        window_expires_at: row.get(17)?,
    })
}

fn map_decision(row: &rusqlite::Row<'_>) -> rusqlite::Result<Decision> {
    let action: String = row.get(1)?;
    let outcome: Option<String> = row.get(7)?;
    Ok(Decision {
        incident_id: row.get(0)?,
        recommended_action: RecommendedAction::parse(&action)
            .ok_or_else(|| text_conversion_error(1, format!("unknown action '{action}'")))?,
        runbook_id: row.get(2)?,
        technician_category: row.get(3)?,
        priority_score: row.get(4)?,
        reason: row.get(5)?,
        can_auto_execute: row.get(6)?,
        outcome: outcome
            .map(|o| {
                DecisionOutcome::parse(&o).ok_or_else(|| {
                    text_conversion_error(7, format!("unknown decision outcome '{o}'"))
                })
            })
            .transpose()?,
        created_at: row.get(8)?,
    })
}

fn map_technician(row: &rusqlite::Row<'_>) -> rusqlite::Result<Technician> {
    let skills: String = row.get(2)?;
    Ok(Technician {
        id: row.get(0)?,
        name: row.get(1)?,
        skills: serde_json::from_str(&skills).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(err))
        })?,
        workload: row.get(3)?,
        available: row.get(4)?,
        last_assigned_at: row.get(5)?,
    })
}

fn map_execution(row: &rusqlite::Row<'_>) -> rusqlite::Result<Execution> {
    let status: String = row.get(5)?;
    Ok(Execution {
        handle: row.get(0)?,
        incident_id: row.get(1)?,
        runbook_id: row.get(2)?,
        tenant_id: row.get(3)?,
        submitted_at: row.get(4)?,
        status: ExecutionStatus::parse(&status).ok_or_else(|| {
            text_conversion_error(5, format!("unknown execution status '{status}'"))
        })?,
        duration_secs: row.get(6)?,
    })
}

fn map_tenant(row: &rusqlite::Row<'_>) -> rusqlite::Result<TenantConfig> {
    let strategy: String = row.get(8)?;
    let critical_assets: String = row.get(9)?;
    Ok(TenantConfig {
        tenant_id: row.get(0)?,
        api_key: row.get(1)?,
        auto_correlate: row.get(2)?,
        window_minutes: row.get(3)?,
        auto_decide: row.get(4)?,
        decide_interval_secs: row.get(5)?,
        sla_minutes: row.get(6)?,
        auto_approve: row.get(7)?,
        assignment_strategy: AssignmentStrategy::parse(&strategy).ok_or_else(|| {
            text_conversion_error(8, format!("unknown assignment strategy '{strategy}'"))
        })?,
        critical_assets: serde_json::from_str(&critical_assets).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(err))
        })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alert, AlertStatus, IncidentStatus, Severity};

    fn db_path(name: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        format!("/tmp/triage-tests/{name}-{nanos}.db")
    }

    fn alert(id: &str, received_at: i64) -> Alert {
        Alert {
            id: id.into(),
            tenant_id: "t1".into(),
            asset: "web-01".into(),
            signature: "disk_full".into(),
            severity: Severity::High,
            message: "disk usage at 97%".into(),
            source: "datadog".into(),
            status: AlertStatus::Active,
            incident_id: None,
            received_at,
            archived: false,
        }
    }

    fn incident(id: &str, now: i64) -> Incident {
        Incident {
            id: id.into(),
            tenant_id: "t1".into(),
            asset: "web-01".into(),
            signature: "disk_full".into(),
            severity: Severity::High,
            category: "storage".into(),
            priority_score: 50.0,
            alert_count: 1,
            tool_sources: vec!["datadog".into()],
            status: IncidentStatus::New,
            assigned_to: None,
            escalated: false,
            escalated_at: None,
            escalation_reason: None,
            created_at: now,
            decided_at: None,
            assigned_at: None,
            window_expires_at: now + 600,
        }
    }

    fn technician(id: &str, skills: &[&str]) -> Technician {
        Technician {
            id: id.into(),
            name: id.to_uppercase(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            workload: 0,
            available: true,
            last_assigned_at: None,
        }
    }

    #[test]
    fn alert_ingestion_is_idempotent() {
        let store = Store::open(db_path("store-alert-idem")).expect("open");
        assert!(store.insert_alert(&alert("a1", 100)).expect("insert"));
        assert!(!store.insert_alert(&alert("a1", 100)).expect("redelivery"));
        assert_eq!(store.count_alerts("t1").expect("count"), 1);
    }

    #[test]
    fn attach_alert_is_a_cas() {
        let store = Store::open(db_path("store-attach")).expect("open");
        store.insert_alert(&alert("a1", 100)).expect("insert");
        store.insert_incident(&incident("inc-1", 100)).expect("incident");

        assert!(store.attach_alert("t1", "a1", "inc-1").expect("first attach"));
        assert!(!store.attach_alert("t1", "a1", "inc-2").expect("losing attach"));

        let stored = store.alert("t1", "a1").expect("get").expect("alert");
        assert_eq!(stored.incident_id.as_deref(), Some("inc-1"));
        assert!(store
            .unattached_active_alerts("t1")
            .expect("pending")
            .is_empty());
    }

    #[test]
    fn find_open_incident_respects_window_and_status() {
        let store = Store::open(db_path("store-open-incident")).expect("open");
        store.insert_incident(&incident("inc-1", 100)).expect("incident");

        assert!(store
            .find_open_incident("t1", "web-01", "disk_full", 500)
            .expect("query")
            .is_some());
        // Window elapsed.
        assert!(store
            .find_open_incident("t1", "web-01", "disk_full", 700)
            .expect("query")
            .is_none());
        // Escalated incidents are immutable for membership.
        store
            .mark_escalated("inc-1", EscalationReason::NoRunbook, 200)
            .expect("escalate");
        assert!(store
            .find_open_incident("t1", "web-01", "disk_full", 500)
            .expect("query")
            .is_none());
    }

    #[test]
    fn mark_escalated_fires_exactly_once() {
        let store = Store::open(db_path("store-escalate-once")).expect("open");
        store.insert_incident(&incident("inc-1", 100)).expect("incident");

        assert!(store
            .mark_escalated("inc-1", EscalationReason::SlaBreach, 200)
            .expect("first"));
        assert!(!store
            .mark_escalated("inc-1", EscalationReason::SlaBreach, 300)
            .expect("double fire"));

        let stored = store.incident("inc-1").expect("get").expect("incident");
        assert!(stored.escalated);
        assert_eq!(stored.escalated_at, Some(200));
        assert_eq!(stored.status, IncidentStatus::Escalated);
    }

    #[test]
    fn assignment_pairs_cas_with_workload() {
        let store = Store::open(db_path("store-assign")).expect("open");
        store.insert_incident(&incident("inc-1", 100)).expect("incident");
        store
            .upsert_technician(&technician("tech-1", &["storage"]))
            .expect("tech");

        assert!(store
            .assign_incident("inc-1", "tech-1", IncidentStatus::Assigned, 200)
            .expect("assign"));
        // A second router racing on the same incident loses the CAS and
        // must not bump anyone's workload.
        assert!(!store
            .assign_incident("inc-1", "tech-2", IncidentStatus::Assigned, 201)
            .expect("losing assign"));

        let tech = store.technician("tech-1").expect("get").expect("tech");
        assert_eq!(tech.workload, 1);
        assert_eq!(store.count_assigned_to("tech-1").expect("count"), 1);

        let released = store.clear_assignee("inc-1").expect("clear");
        assert_eq!(released.as_deref(), Some("tech-1"));
        let tech = store.technician("tech-1").expect("get").expect("tech");
        assert_eq!(tech.workload, 0);
    }

    #[test]
    fn assignment_to_unavailable_technician_rolls_back() {
        let store = Store::open(db_path("store-assign-unavail")).expect("open");
        store.insert_incident(&incident("inc-1", 100)).expect("incident");
        let mut tech = technician("tech-1", &["storage"]);
        tech.available = false;
        store.upsert_technician(&tech).expect("tech");

        assert!(!store
            .assign_incident("inc-1", "tech-1", IncidentStatus::Assigned, 200)
            .expect("assign"));
        let stored = store.incident("inc-1").expect("get").expect("incident");
        assert_eq!(stored.assigned_to, None, "claim must roll back");
    }

    #[test]
    fn queue_orders_by_priority_then_age() {
        let store = Store::open(db_path("store-queue")).expect("open");
        for (id, score, at) in [("i-low", 20.0, 10), ("i-old", 80.0, 5), ("i-new", 80.0, 50)] {
            store
                .enqueue(&QueueEntry {
                    incident_id: id.into(),
                    tenant_id: "t1".into(),
                    priority_score: score,
                    enqueued_at: at,
                })
                .expect("enqueue");
        }
        let order: Vec<String> = store
            .queued_entries()
            .expect("entries")
            .into_iter()
            .map(|e| e.incident_id)
            .collect();
        assert_eq!(order, ["i-old", "i-new", "i-low"]);
        assert!(store.dequeue("i-old").expect("dequeue"));
        assert!(!store.dequeue("i-old").expect("gone"));
    }

    #[test]
    fn execution_completion_is_exactly_once() {
        let store = Store::open(db_path("store-exec")).expect("open");
        store
            .insert_execution(&Execution {
                handle: "h-1".into(),
                incident_id: "inc-1".into(),
                runbook_id: "rb-1".into(),
                tenant_id: "t1".into(),
                submitted_at: 100,
                status: ExecutionStatus::Pending,
                duration_secs: None,
            })
            .expect("insert");

        assert!(store
            .complete_execution("h-1", ExecutionStatus::Success, Some(12))
            .expect("complete"));
        assert!(!store
            .complete_execution("h-1", ExecutionStatus::Failure, Some(13))
            .expect("duplicate callback"));

        let exec = store.execution("h-1").expect("get").expect("row");
        assert_eq!(exec.status, ExecutionStatus::Success);
        assert_eq!(exec.duration_secs, Some(12));
    }

    #[test]
    fn tenant_roundtrip_and_deletion_clears_queue() {
        let store = Store::open(db_path("store-tenant")).expect("open");
        let mut cfg = TenantConfig::new("t1", "key-1");
        cfg.critical_assets = vec!["db-01".into()];
        store.upsert_tenant(&cfg).expect("upsert");

        let loaded = store.tenant("t1").expect("get").expect("cfg");
        assert_eq!(loaded.critical_assets, vec!["db-01".to_string()]);
        assert!(store
            .tenant_by_api_key("key-1")
            .expect("by key")
            .is_some());

        store
            .enqueue(&QueueEntry {
                incident_id: "inc-1".into(),
                tenant_id: "t1".into(),
                priority_score: 10.0,
                enqueued_at: 1,
            })
            .expect("enqueue");

        assert!(store.delete_tenant("t1").expect("delete"));
        assert!(store.tenant("t1").expect("get").is_none());
        assert!(store.queued_entries().expect("queue").is_empty());
        assert!(!store.delete_tenant("t1").expect("double delete"));
    }

    #[test]
    fn archive_flags_only_old_resolved_alerts() {
        let store = Store::open(db_path("store-archive")).expect("open");
        store.insert_alert(&alert("a1", 100)).expect("a1");
        store.insert_alert(&alert("a2", 100)).expect("a2");
        store
            .set_alert_status("t1", "a1", AlertStatus::Resolved)
            .expect("resolve");

        assert_eq!(store.archive_resolved_alerts("t1", 200).expect("archive"), 1);
        assert_eq!(store.count_alerts("t1").expect("count"), 1);
    }
}
