//! Decision rules. Pure and deterministic: identical incident state,
//! runbook lookup result, and tenant policy always produce the same
//! recommendation. Side effects (recording, execution submission,
//! escalation routing) live in the engine.

use crate::model::{Decision, Incident, RecommendedAction, RiskLevel, Runbook};

pub const REASON_NO_RUNBOOK: &str = "no applicable runbook";
pub const REASON_AUTO_EXECUTE: &str = "low-risk runbook eligible for auto-remediation";
pub const REASON_NEEDS_APPROVAL: &str = "runbook requires human approval";

/// Apply the decision rules in order:
/// 1. no runbook -> escalate;
/// 2. low-risk runbook + tenant auto-approval -> execute unattended;
/// 3. otherwise -> execute, but surfaced for human approval.
pub fn evaluate(
    incident: &Incident,
    runbook: Option<Runbook>,
    auto_approve: bool,
    now: i64,
) -> Decision {
    match runbook {
        None => Decision {
            incident_id: incident.id.clone(),
            recommended_action: RecommendedAction::Escalate,
            runbook_id: None,
            technician_category: Some(incident.category.clone()),
            priority_score: incident.priority_score,
            reason: format!(
                "{REASON_NO_RUNBOOK} for signature '{}'",
                incident.signature
            ),
            can_auto_execute: false,
            outcome: None,
            created_at: now,
        },
        Some(runbook) => {
            let can_auto_execute =
                runbook.risk == RiskLevel::Low && !runbook.requires_approval && auto_approve;
            let reason = if can_auto_execute {
                format!("{REASON_AUTO_EXECUTE} ({})", runbook.id)
            } else {
                format!(
                    "{REASON_NEEDS_APPROVAL} ({}, risk {})",
                    runbook.id,
                    runbook.risk.as_str()
                )
            };
            Decision {
                incident_id: incident.id.clone(),
                recommended_action: RecommendedAction::Execute,
                runbook_id: Some(runbook.id),
                technician_category: Some(incident.category.clone()),
                priority_score: incident.priority_score,
                reason,
                can_auto_execute,
                outcome: None,
                created_at: now,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IncidentStatus, Severity};

    fn incident() -> Incident {
        Incident {
            id: "inc-1".into(),
            tenant_id: "t1".into(),
            asset: "web-01".into(),
            signature: "disk_full".into(),
            severity: Severity::Critical,
            category: "storage".into(),
            priority_score: 80.0,
            alert_count: 10,
            tool_sources: vec!["datadog".into()],
            status: IncidentStatus::New,
            assigned_to: None,
            escalated: false,
            escalated_at: None,
            escalation_reason: None,
            created_at: 100,
            decided_at: None,
            assigned_at: None,
            window_expires_at: 1_000,
        }
    }

    fn runbook(risk: RiskLevel, requires_approval: bool) -> Runbook {
        Runbook {
            id: "rb-disk-cleanup".into(),
            signature: "disk_full".into(),
            category: "storage".into(),
            risk,
            requires_approval,
        }
    }

    #[test]
    fn missing_runbook_escalates() {
        let decision = evaluate(&incident(), None, true, 200);
        assert_eq!(decision.recommended_action, RecommendedAction::Escalate);
        assert!(!decision.can_auto_execute);
        assert!(decision.reason.contains(REASON_NO_RUNBOOK));
        assert_eq!(decision.technician_category.as_deref(), Some("storage"));
    }

    #[test]
    fn low_risk_with_auto_approval_executes_unattended() {
        let decision = evaluate(&incident(), Some(runbook(RiskLevel::Low, false)), true, 200);
        assert_eq!(decision.recommended_action, RecommendedAction::Execute);
        assert!(decision.can_auto_execute);
        assert_eq!(decision.runbook_id.as_deref(), Some("rb-disk-cleanup"));
    }

    #[test]
    fn approval_required_blocks_auto_execution() {
        for (risk, requires_approval, auto_approve) in [
            (RiskLevel::Medium, true, true),
            (RiskLevel::High, true, true),
            (RiskLevel::Low, true, true),
            (RiskLevel::Low, false, false),
        ] {
            let decision = evaluate(
                &incident(),
                Some(runbook(risk, requires_approval)),
                auto_approve,
                200,
            );
            assert_eq!(decision.recommended_action, RecommendedAction::Execute);
            assert!(
                !decision.can_auto_execute,
                "risk {risk:?} approval {requires_approval} auto {auto_approve}"
            );
        }
    }

    #[test]
    fn evaluation_is_deterministic() {
        let a = evaluate(&incident(), Some(runbook(RiskLevel::Low, false)), true, 200);
        let b = evaluate(&incident(), Some(runbook(RiskLevel::Low, false)), true, 200);
        assert_eq!(a.recommended_action, b.recommended_action);
        assert_eq!(a.can_auto_execute, b.can_auto_execute);
        assert_eq!(a.reason, b.reason);
        assert_eq!(a.runbook_id, b.runbook_id);
    }

    #[test]
    fn priority_snapshot_follows_the_incident() {
        let mut high = incident();
        high.priority_score = 91.5;
        let decision = evaluate(&high, None, true, 200);
        assert_eq!(decision.priority_score, 91.5);
    }
}
