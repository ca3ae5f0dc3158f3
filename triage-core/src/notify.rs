//! Notification sink seam. The engine emits assignment, escalation, and
//! overflow notices; rendering and delivery belong to an external system.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ADMINISTRATORS: &str = "administrators";
pub const SENIOR_TIER: &str = "senior-tier";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Assigned,
    Escalated,
    Overflow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Assigned => "assigned",
            NotificationKind::Escalated => "escalated",
            NotificationKind::Overflow => "overflow",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub incident_id: String,
    pub recipient: String,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Default sink: structured log lines. Enough for the engine's contract;
/// a real deployment points this at the delivery service.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: &Notification) {
        info!(
            kind = notification.kind.as_str(),
            incident_id = %notification.incident_id,
            recipient = %notification.recipient,
            "notification emitted"
        );
    }
}

/// Capture sink for tests and local inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: &Notification) {
        self.sent.lock().push(notification.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_captures_in_order() {
        let sink = RecordingSink::default();
        for (kind, incident) in [
            (NotificationKind::Assigned, "inc-1"),
            (NotificationKind::Overflow, "inc-2"),
        ] {
            sink.notify(&Notification {
                kind,
                incident_id: incident.into(),
                recipient: ADMINISTRATORS.into(),
            });
        }
        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].kind, NotificationKind::Assigned);
        assert_eq!(sent[1].incident_id, "inc-2");
    }
}
