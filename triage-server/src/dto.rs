use serde::{Deserialize, Serialize};
use triage_core::event_log::Event;
use triage_core::model::Incident;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncidentDto {
    pub id: String,
    pub asset: String,
    pub signature: String,
    pub severity: String,
    pub category: String,
    pub status: String,
    pub priority_score: f64,
    pub alert_count: u32,
    pub tool_sources: Vec<String>,
    pub assigned_to: Option<String>,
    pub escalated: bool,
    pub created_at: i64,
}

impl From<Incident> for IncidentDto {
    fn from(incident: Incident) -> Self {
        Self {
            id: incident.id,
            asset: incident.asset,
            signature: incident.signature,
            severity: incident.severity.as_str().into(),
            category: incident.category,
            status: incident.status.as_str().into(),
            priority_score: incident.priority_score,
            alert_count: incident.alert_count,
            tool_sources: incident.tool_sources,
            assigned_to: incident.assigned_to,
            escalated: incident.escalated,
            created_at: incident.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelineEventDto {
    pub id: i64,
    pub event_type: String,
    pub description: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: i64,
}

impl From<Event> for TimelineEventDto {
    fn from(event: Event) -> Self {
        Self {
            id: event.id.unwrap_or_default(),
            event_type: event.event_type.as_str().into(),
            description: event.description,
            details: event.details,
            timestamp: event.timestamp,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CompleteExecutionRequest {
    pub status: String,
    pub duration_secs: Option<i64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TechnicianRequest {
    pub id: String,
    pub name: String,
    pub skills: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}
