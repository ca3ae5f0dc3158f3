use serde::{Deserialize, Serialize};

/// Ordinal fault severity. Ordering follows declaration order, so
/// `Severity::Critical > Severity::High` holds and incident severity can be
/// promoted with `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Severity> {
        match value.to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<AlertStatus> {
        match value {
            "active" => Some(AlertStatus::Active),
            "acknowledged" => Some(AlertStatus::Acknowledged),
            "resolved" => Some(AlertStatus::Resolved),
            _ => None,
        }
    }
}

/// One raw signal from a monitoring source. Never deleted; only its status
/// and incident back-reference change after ingestion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub tenant_id: String,
    pub asset: String,
    pub signature: String,
    pub severity: Severity,
    pub message: String,
    pub source: String,
    pub status: AlertStatus,
    pub incident_id: Option<String>,
    pub received_at: i64,
    pub archived: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
    /// Correlated, no decision recorded yet (or decided and awaiting
    /// human approval).
    New,
    /// A runbook execution is in flight.
    Executing,
    /// Routed to a technician.
    Assigned,
    /// Handed to a human tier outside the auto-decide path.
    Escalated,
    Resolved,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::New => "new",
            IncidentStatus::Executing => "executing",
            IncidentStatus::Assigned => "assigned",
            IncidentStatus::Escalated => "escalated",
            IncidentStatus::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<IncidentStatus> {
        match value {
            "new" => Some(IncidentStatus::New),
            "executing" => Some(IncidentStatus::Executing),
            "assigned" => Some(IncidentStatus::Assigned),
            "escalated" => Some(IncidentStatus::Escalated),
            "resolved" => Some(IncidentStatus::Resolved),
            _ => None,
        }
    }
}

/// A time-windowed group of alerts believed to share one root cause.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub tenant_id: String,
    pub asset: String,
    pub signature: String,
    pub severity: Severity,
    pub category: String,
    pub priority_score: f64,
    pub alert_count: u32,
    pub tool_sources: Vec<String>,
    pub status: IncidentStatus,
    pub assigned_to: Option<String>,
    pub escalated: bool,
    pub escalated_at: Option<i64>,
    pub escalation_reason: Option<EscalationReason>,
    pub created_at: i64,
    pub decided_at: Option<i64>,
    pub assigned_at: Option<i64>,
    pub window_expires_at: i64,
}

impl Incident {
    /// Membership may still grow: the window is open and the incident has
    /// not left the correlatable part of its lifecycle.
    pub fn accepts_members(&self, now: i64) -> bool {
        !matches!(
            self.status,
            IncidentStatus::Resolved | IncidentStatus::Escalated
        ) && self.window_expires_at > now
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    Execute,
    Escalate,
}

impl RecommendedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::Execute => "execute",
            RecommendedAction::Escalate => "escalate",
        }
    }

    pub fn parse(value: &str) -> Option<RecommendedAction> {
        match value {
            "execute" => Some(RecommendedAction::Execute),
            "escalate" => Some(RecommendedAction::Escalate),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionOutcome {
    Executed,
    Approved,
    Rejected,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Executed => "executed",
            DecisionOutcome::Approved => "approved",
            DecisionOutcome::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<DecisionOutcome> {
        match value {
            "executed" => Some(DecisionOutcome::Executed),
            "approved" => Some(DecisionOutcome::Approved),
            "rejected" => Some(DecisionOutcome::Rejected),
            _ => None,
        }
    }
}

/// The engine's recommendation for one incident. Owned 1:1 by the incident;
/// immutable once recorded except for the terminal `outcome` field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Decision {
    pub incident_id: String,
    pub recommended_action: RecommendedAction,
    pub runbook_id: Option<String>,
    pub technician_category: Option<String>,
    pub priority_score: f64,
    pub reason: String,
    pub can_auto_execute: bool,
    pub outcome: Option<DecisionOutcome>,
    pub created_at: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// A predefined remediation procedure. Read-only to the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Runbook {
    pub id: String,
    pub signature: String,
    pub category: String,
    pub risk: RiskLevel,
    pub requires_approval: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Technician {
    pub id: String,
    pub name: String,
    pub skills: Vec<String>,
    pub workload: u32,
    pub available: bool,
    pub last_assigned_at: Option<i64>,
}

impl Technician {
    pub fn has_skill(&self, category: &str) -> bool {
        self.skills.iter().any(|s| s.eq_ignore_ascii_case(category))
    }
}

/// An incident waiting because no technician was eligible at routing time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueEntry {
    pub incident_id: String,
    pub tenant_id: String,
    pub priority_score: f64,
    pub enqueued_at: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    SlaBreach,
    NoRunbook,
    ApprovalDenied,
    RemediationFailed,
    ManualOverride,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationReason::SlaBreach => "sla_breach",
            EscalationReason::NoRunbook => "no_runbook",
            EscalationReason::ApprovalDenied => "approval_denied",
            EscalationReason::RemediationFailed => "remediation_failed",
            EscalationReason::ManualOverride => "manual_override",
        }
    }

    pub fn parse(value: &str) -> Option<EscalationReason> {
        match value {
            "sla_breach" => Some(EscalationReason::SlaBreach),
            "no_runbook" => Some(EscalationReason::NoRunbook),
            "approval_denied" => Some(EscalationReason::ApprovalDenied),
            "remediation_failed" => Some(EscalationReason::RemediationFailed),
            "manual_override" => Some(EscalationReason::ManualOverride),
            _ => None,
        }
    }
}

/// Audit row for one automatic or manual escalation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscalationRecord {
    pub id: Option<i64>,
    pub incident_id: String,
    pub triggered_at: i64,
    pub trigger_reason: EscalationReason,
    pub previous_assignee: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Success,
    Failure,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failure => "failure",
        }
    }

    pub fn parse(value: &str) -> Option<ExecutionStatus> {
        match value {
            "pending" => Some(ExecutionStatus::Pending),
            "success" => Some(ExecutionStatus::Success),
            "failure" => Some(ExecutionStatus::Failure),
            _ => None,
        }
    }
}

/// One submitted runbook execution, tracked until its completion callback
/// arrives from the remote connector.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Execution {
    pub handle: String,
    pub incident_id: String,
    pub runbook_id: String,
    pub tenant_id: String,
    pub submitted_at: i64,
    pub status: ExecutionStatus,
    pub duration_secs: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    SkillBased,
    RoundRobin,
    LeastBusy,
}

impl AssignmentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStrategy::SkillBased => "skill_based",
            AssignmentStrategy::RoundRobin => "round_robin",
            AssignmentStrategy::LeastBusy => "least_busy",
        }
    }

    pub fn parse(value: &str) -> Option<AssignmentStrategy> {
        match value {
            "skill_based" => Some(AssignmentStrategy::SkillBased),
            "round_robin" => Some(AssignmentStrategy::RoundRobin),
            "least_busy" => Some(AssignmentStrategy::LeastBusy),
            _ => None,
        }
    }
}
