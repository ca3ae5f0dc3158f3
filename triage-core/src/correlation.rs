//! Alert correlation. Folds the tenant's unattached, unresolved alerts
//! into incidents keyed by (tenant, asset, signature) inside a sliding
//! window. Safe to run reactively on ingestion and on a fixed periodic
//! interval: an alert already bound to an incident is never considered
//! again, so re-running over an unchanged set is a no-op.

use crate::config::TenantConfig;
use crate::error::Result;
use crate::event_log::{EventLog, EventType};
use crate::model::{Incident, IncidentStatus};
use crate::scoring;
use crate::store::Store;
use crate::rules;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CorrelationOutcome {
    pub alerts_before: usize,
    pub alerts_after: usize,
    pub incidents_created: usize,
    pub incidents_updated: usize,
    pub alerts_correlated: usize,
    pub duplicates_found: usize,
}

pub fn correlate(
    store: &Store,
    log: &EventLog,
    cfg: &TenantConfig,
    now: i64,
) -> Result<CorrelationOutcome> {
    let pending = store.unattached_active_alerts(&cfg.tenant_id)?;
    let mut outcome = CorrelationOutcome {
        alerts_before: pending.len(),
        ..Default::default()
    };
    let mut touched_incidents: HashSet<String> = HashSet::new();

    for alert in pending {
        let open = store.find_open_incident(&cfg.tenant_id, &alert.asset, &alert.signature, now)?;
        match open {
            Some(mut incident) => {
                // A concurrent sweep may have bound this alert already; the
                // CAS losing here means attach happened elsewhere.
                if !store.attach_alert(&cfg.tenant_id, &alert.id, &incident.id)? {
                    continue;
                }
                incident.alert_count += 1;
                // Severity promotion is monotonic.
                incident.severity = incident.severity.max(alert.severity);
                if !incident.tool_sources.contains(&alert.source) {
                    incident.tool_sources.push(alert.source.clone());
                    incident.tool_sources.sort();
                }
                // The window slides only until a decision is recorded, so
                // late duplicates cannot contaminate an in-flight decision.
                if incident.status == IncidentStatus::New
                    && store.decision(&incident.id)?.is_none()
                {
                    incident.window_expires_at = now + cfg.window_secs();
                }
                incident.priority_score = scoring::score(
                    incident.severity,
                    cfg.is_critical_asset(&incident.asset),
                    incident.alert_count,
                    incident.tool_sources.len(),
                    incident.created_at,
                    now,
                );
                store.update_membership(&incident)?;
                log.record(
                    &incident.id,
                    EventType::AlertAttached,
                    format!("alert {} attached", alert.id),
                    Some(serde_json::json!({
                        "alert_id": alert.id,
                        "severity": alert.severity.as_str(),
                        "source": alert.source,
                        "alert_count": incident.alert_count,
                    })),
                    now,
                )?;
                debug!(
                    incident_id = %incident.id,
                    alert_id = %alert.id,
                    alert_count = incident.alert_count,
                    "alert correlated into open incident"
                );
                touched_incidents.insert(incident.id);
                outcome.alerts_correlated += 1;
                outcome.duplicates_found += 1;
            }
            None => {
                let incident = seed_incident(&alert, cfg, now);
                store.insert_incident(&incident)?;
                store.attach_alert(&cfg.tenant_id, &alert.id, &incident.id)?;
                log.record(
                    &incident.id,
                    EventType::IncidentCreated,
                    format!("incident opened for {} on {}", alert.signature, alert.asset),
                    Some(serde_json::json!({
                        "alert_id": alert.id,
                        "signature": alert.signature,
                        "asset": alert.asset,
                        "category": incident.category,
                    })),
                    now,
                )?;
                info!(
                    incident_id = %incident.id,
                    tenant_id = %cfg.tenant_id,
                    signature = %incident.signature,
                    asset = %incident.asset,
                    "incident created"
                );
                outcome.incidents_created += 1;
                outcome.alerts_correlated += 1;
            }
        }
    }

    outcome.incidents_updated = touched_incidents.len();
    outcome.alerts_after = store.unattached_active_alerts(&cfg.tenant_id)?.len();
    Ok(outcome)
}

fn seed_incident(alert: &crate::model::Alert, cfg: &TenantConfig, now: i64) -> Incident {
    let category = rules::categorize(&alert.signature, &alert.message).to_string();
    let priority_score = scoring::score(
        alert.severity,
        cfg.is_critical_asset(&alert.asset),
        1,
        1,
        now,
        now,
    );
    Incident {
        id: format!("inc-{}", Uuid::new_v4()),
        tenant_id: alert.tenant_id.clone(),
        asset: alert.asset.clone(),
        signature: alert.signature.clone(),
        severity: alert.severity,
        category,
        priority_score,
        alert_count: 1,
        tool_sources: vec![alert.source.clone()],
        status: IncidentStatus::New,
        assigned_to: None,
        escalated: false,
        escalated_at: None,
        escalation_reason: None,
        created_at: now,
        decided_at: None,
        assigned_at: None,
        window_expires_at: now + cfg.window_secs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alert, AlertStatus, Severity};

    fn db_path(name: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        format!("/tmp/triage-tests/{name}-{nanos}.db")
    }

    fn setup(name: &str) -> (Store, EventLog, TenantConfig) {
        let path = db_path(name);
        let store = Store::open(&path).expect("store");
        let log = EventLog::open(&path).expect("log");
        let mut cfg = TenantConfig::new("t1", "key");
        cfg.window_minutes = 15;
        store.upsert_tenant(&cfg).expect("tenant");
        (store, log, cfg)
    }

    fn alert(id: &str, severity: Severity, source: &str, received_at: i64) -> Alert {
        Alert {
            id: id.into(),
            tenant_id: "t1".into(),
            asset: "web-01".into(),
            signature: "disk_full".into(),
            severity,
            message: "disk usage at 97%".into(),
            source: source.into(),
            status: AlertStatus::Active,
            incident_id: None,
            received_at,
            archived: false,
        }
    }

    #[test]
    fn same_key_alerts_fold_into_one_incident() {
        let (store, log, cfg) = setup("corr-fold");
        for i in 0..4 {
            store
                .insert_alert(&alert(&format!("a{i}"), Severity::High, "datadog", 100 + i))
                .expect("insert");
        }

        let outcome = correlate(&store, &log, &cfg, 200).expect("correlate");
        assert_eq!(outcome.incidents_created, 1);
        assert_eq!(outcome.alerts_correlated, 4);
        assert_eq!(outcome.duplicates_found, 3);
        assert_eq!(outcome.alerts_after, 0);

        let incidents = store.incidents_for_tenant("t1").expect("incidents");
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].alert_count, 4);
    }

    #[test]
    fn rerunning_correlate_is_idempotent() {
        let (store, log, cfg) = setup("corr-idem");
        for i in 0..3 {
            store
                .insert_alert(&alert(&format!("a{i}"), Severity::High, "datadog", 100))
                .expect("insert");
        }

        let first = correlate(&store, &log, &cfg, 200).expect("first");
        assert_eq!(first.incidents_created, 1);

        let second = correlate(&store, &log, &cfg, 210).expect("second");
        assert_eq!(second.alerts_before, 0);
        assert_eq!(second.incidents_created, 0);
        assert_eq!(second.alerts_correlated, 0);

        let incidents = store.incidents_for_tenant("t1").expect("incidents");
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].alert_count, 3);
    }

    #[test]
    fn severity_is_promoted_monotonically() {
        let (store, log, cfg) = setup("corr-severity");
        store
            .insert_alert(&alert("a1", Severity::Critical, "datadog", 100))
            .expect("a1");
        correlate(&store, &log, &cfg, 150).expect("first");

        store
            .insert_alert(&alert("a2", Severity::Low, "zabbix", 160))
            .expect("a2");
        correlate(&store, &log, &cfg, 200).expect("second");

        let incidents = store.incidents_for_tenant("t1").expect("incidents");
        assert_eq!(incidents[0].severity, Severity::Critical);
        assert_eq!(
            incidents[0].tool_sources,
            vec!["datadog".to_string(), "zabbix".to_string()]
        );
    }

    #[test]
    fn elapsed_window_starts_a_new_incident() {
        let (store, log, cfg) = setup("corr-window");
        store
            .insert_alert(&alert("a1", Severity::High, "datadog", 100))
            .expect("a1");
        correlate(&store, &log, &cfg, 100).expect("first");

        // Well past window_expires_at = 100 + 15 * 60.
        store
            .insert_alert(&alert("a2", Severity::High, "datadog", 5_000))
            .expect("a2");
        let outcome = correlate(&store, &log, &cfg, 5_000).expect("second");
        assert_eq!(outcome.incidents_created, 1);

        let incidents = store.incidents_for_tenant("t1").expect("incidents");
        assert_eq!(incidents.len(), 2);
    }

    #[test]
    fn window_does_not_extend_after_decision() {
        let (store, log, cfg) = setup("corr-freeze");
        store
            .insert_alert(&alert("a1", Severity::High, "datadog", 100))
            .expect("a1");
        correlate(&store, &log, &cfg, 100).expect("first");

        let incident = &store.incidents_for_tenant("t1").expect("incidents")[0];
        let frozen_window = incident.window_expires_at;
        store
            .upsert_decision(&crate::model::Decision {
                incident_id: incident.id.clone(),
                recommended_action: crate::model::RecommendedAction::Execute,
                runbook_id: Some("rb-1".into()),
                technician_category: Some("storage".into()),
                priority_score: incident.priority_score,
                reason: "test".into(),
                can_auto_execute: false,
                outcome: None,
                created_at: 150,
            })
            .expect("decision");

        store
            .insert_alert(&alert("a2", Severity::High, "datadog", 200))
            .expect("a2");
        correlate(&store, &log, &cfg, 200).expect("second");

        let updated = store.incident(&incident.id).expect("get").expect("incident");
        assert_eq!(updated.alert_count, 2, "late duplicate still attaches");
        assert_eq!(
            updated.window_expires_at, frozen_window,
            "window frozen once a decision is recorded"
        );
    }
}
