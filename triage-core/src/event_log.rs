//! Append-only incident timeline. Every pipeline side effect lands here so
//! an incident's history (including failed remediation attempts) survives
//! status transitions, and dashboards can follow the stream incrementally
//! via `events_after`.

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    IncidentCreated,
    AlertAttached,
    DecisionRecorded,
    ExecutionStarted,
    ExecutionSucceeded,
    ExecutionFailed,
    Assigned,
    Queued,
    Escalated,
    Resolved,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::IncidentCreated => "incident_created",
            EventType::AlertAttached => "alert_attached",
            EventType::DecisionRecorded => "decision_recorded",
            EventType::ExecutionStarted => "execution_started",
            EventType::ExecutionSucceeded => "execution_succeeded",
            EventType::ExecutionFailed => "execution_failed",
            EventType::Assigned => "assigned",
            EventType::Queued => "queued",
            EventType::Escalated => "escalated",
            EventType::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<EventType> {
        match value {
            "incident_created" => Some(EventType::IncidentCreated),
            "alert_attached" => Some(EventType::AlertAttached),
            "decision_recorded" => Some(EventType::DecisionRecorded),
            "execution_started" => Some(EventType::ExecutionStarted),
            "execution_succeeded" => Some(EventType::ExecutionSucceeded),
            "execution_failed" => Some(EventType::ExecutionFailed),
            "assigned" => Some(EventType::Assigned),
            "queued" => Some(EventType::Queued),
            "escalated" => Some(EventType::Escalated),
            "resolved" => Some(EventType::Resolved),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<i64>,
    pub incident_id: String,
    pub event_type: EventType,
    pub description: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: i64,
}

#[derive(Clone)]
pub struct EventLog {
    db_path: Arc<PathBuf>,
}

impl EventLog {
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
            CREATE TABLE IF NOT EXISTS incident_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                incident_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                description TEXT NOT NULL,
                details TEXT,
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_incident_events_incident
                ON incident_events(incident_id);
            ",
        )?;

        Ok(Self {
            db_path: Arc::new(db_path),
        })
    }

    pub fn record(
        &self,
        incident_id: &str,
        event_type: EventType,
        description: impl Into<String>,
        details: Option<serde_json::Value>,
        now: i64,
    ) -> Result<i64> {
        let conn = Connection::open(&*self.db_path)?;
        let details = details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            "INSERT INTO incident_events (incident_id, event_type, description, details, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                incident_id,
                event_type.as_str(),
                description.into(),
                details,
                now,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    pub fn events_for_incident(&self, incident_id: &str) -> Result<Vec<Event>> {
        let conn = Connection::open(&*self.db_path)?;
        let mut stmt = conn.prepare(
            "SELECT id, incident_id, event_type, description, details, timestamp
             FROM incident_events
             WHERE incident_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![incident_id], map_row)?;
        collect_events(rows)
    }

    pub fn events_after(&self, after_id: i64) -> Result<Vec<Event>> {
        let conn = Connection::open(&*self.db_path)?;
        let mut stmt = conn.prepare(
            "SELECT id, incident_id, event_type, description, details, timestamp
             FROM incident_events
             WHERE id > ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![after_id], map_row)?;
        collect_events(rows)
    }

    pub fn latest_event_id(&self) -> Result<Option<i64>> {
        let conn = Connection::open(&*self.db_path)?;
        let id = conn
            .query_row("SELECT MAX(id) FROM incident_events", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .optional()?;
        Ok(id.flatten())
    }
}

fn collect_events(
    rows: impl Iterator<Item = rusqlite::Result<Event>>,
) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let event_type_str: String = row.get(2)?;
    let details_str: Option<String> = row.get(4)?;

    let event_type = EventType::parse(&event_type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown event type '{event_type_str}'").into(),
        )
    })?;

    let details = details_str
        .map(|s| {
            serde_json::from_str(&s).map_err(|err| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    Box::new(err),
                )
            })
        })
        .transpose()?;

    Ok(Event {
        id: row.get(0)?,
        incident_id: row.get(1)?,
        event_type,
        description: row.get(3)?,
        details,
        timestamp: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_path(name: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        format!("/tmp/triage-tests/{name}-{nanos}.db")
    }

    #[test]
    fn record_and_query_roundtrip() {
        let log = EventLog::open(db_path("log-roundtrip")).expect("open");
        let id = log
            .record(
                "inc-a",
                EventType::IncidentCreated,
                "incident created",
                Some(serde_json::json!({"signature": "disk_full"})),
                100,
            )
            .expect("record");
        assert!(id > 0);

        let events = log.events_for_incident("inc-a").expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::IncidentCreated);
        assert_eq!(
            events[0].details,
            Some(serde_json::json!({"signature": "disk_full"}))
        );
    }

    #[test]
    fn events_after_tracks_incremental_stream() {
        let log = EventLog::open(db_path("log-after")).expect("open");
        let a = log
            .record("inc-a", EventType::IncidentCreated, "created", None, 1)
            .expect("a");
        let b = log
            .record("inc-a", EventType::Resolved, "resolved", None, 2)
            .expect("b");

        let events = log.events_after(a).expect("after");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, Some(b));
        assert_eq!(log.latest_event_id().expect("latest"), Some(b));
    }

    #[test]
    fn event_types_roundtrip_through_strings() {
        for event_type in [
            EventType::IncidentCreated,
            EventType::AlertAttached,
            EventType::DecisionRecorded,
            EventType::ExecutionStarted,
            EventType::ExecutionSucceeded,
            EventType::ExecutionFailed,
            EventType::Assigned,
            EventType::Queued,
            EventType::Escalated,
            EventType::Resolved,
        ] {
            assert_eq!(EventType::parse(event_type.as_str()), Some(event_type));
        }
    }
}
