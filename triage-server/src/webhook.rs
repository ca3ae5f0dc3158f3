//! Alert ingestion. Source-specific webhook payloads are mapped into the
//! canonical alert shape by an adapter, validated at the boundary, and
//! appended to the store under the tenant resolved from the request's API
//! key. Malformed payloads are rejected here and never enter the store.

use crate::state::{now, AppState};
use alert_registry::{normalize_signature, validate_alert_v1, CanonicalAlertV1, ALERT_SCHEMA_V1};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use tracing::{debug, warn};
use triage_core::model::{Alert, AlertStatus, Severity};
use triage_core::EngineError;

pub const API_KEY_HEADER: &str = "x-api-key";

pub trait AlertAdapter: Send + Sync + 'static {
    fn parse(&self, payload: &serde_json::Value) -> Result<CanonicalAlertV1, String>;
}

fn str_field(payload: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| payload.get(*key).and_then(serde_json::Value::as_str))
        .map(ToString::to_string)
}

pub struct GenericAdapter;
pub struct AlertmanagerAdapter;

impl AlertAdapter for GenericAdapter {
    fn parse(&self, payload: &serde_json::Value) -> Result<CanonicalAlertV1, String> {
        let alert = CanonicalAlertV1 {
            schema: ALERT_SCHEMA_V1.into(),
            id: str_field(payload, &["id", "alert_id"])
                .ok_or_else(|| "id is required".to_string())?,
            asset: str_field(payload, &["asset", "asset_name", "host"])
                .ok_or_else(|| "asset is required".to_string())?,
            signature: str_field(payload, &["signature", "check", "alert_type"])
                .map(|s| normalize_signature(&s))
                .ok_or_else(|| "signature is required".to_string())?,
            severity: str_field(payload, &["severity"]).unwrap_or_else(|| "high".into()),
            message: str_field(payload, &["message", "description"]).unwrap_or_default(),
            source: str_field(payload, &["source", "tool"]).unwrap_or_else(|| "generic".into()),
            occurred_at: payload
                .get("occurred_at")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or_else(now),
        };
        validate_alert_v1(&alert)?;
        Ok(alert)
    }
}

impl AlertAdapter for AlertmanagerAdapter {
    fn parse(&self, payload: &serde_json::Value) -> Result<CanonicalAlertV1, String> {
        let first = payload
            .get("alerts")
            .and_then(serde_json::Value::as_array)
            .and_then(|a| a.first())
            .ok_or_else(|| "alertmanager payload missing alerts[0]".to_string())?;

        let labels = first.get("labels").cloned().unwrap_or_else(|| serde_json::json!({}));
        let annotations = first
            .get("annotations")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        let signature = labels
            .get("alertname")
            .and_then(serde_json::Value::as_str)
            .map(normalize_signature)
            .ok_or_else(|| "alertmanager payload missing alertname".to_string())?;

        let asset = labels
            .get("instance")
            .or_else(|| labels.get("host"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| "alertmanager payload missing instance".to_string())?
            .to_string();

        let message = annotations
            .get("summary")
            .or_else(|| annotations.get("description"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("alertmanager alert")
            .to_string();

        let id = first
            .get("fingerprint")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("{signature}-{asset}-{}", now()));

        let alert = CanonicalAlertV1 {
            schema: ALERT_SCHEMA_V1.into(),
            id,
            asset,
            signature,
            severity: labels
                .get("severity")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("high")
                .to_string(),
            message,
            source: "alertmanager".into(),
            occurred_at: now(),
        };
        validate_alert_v1(&alert)?;
        Ok(alert)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook/generic", post(handle_generic))
        .route("/webhook/alertmanager", post(handle_alertmanager))
}

async fn handle_generic(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    ingest(&state, &headers, &payload, GenericAdapter)
}

async fn handle_alertmanager(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    ingest(&state, &headers, &payload, AlertmanagerAdapter)
}

fn ingest(
    state: &AppState,
    headers: &HeaderMap,
    payload: &serde_json::Value,
    adapter: impl AlertAdapter,
) -> StatusCode {
    let Some(api_key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) else {
        return StatusCode::UNAUTHORIZED;
    };
    let tenant = match state.engine.store().tenant_by_api_key(api_key) {
        Ok(Some(tenant)) => tenant,
        Ok(None) => return StatusCode::UNAUTHORIZED,
        Err(err) => {
            warn!(error = %err, "tenant lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let canonical = match adapter.parse(payload) {
        Ok(canonical) => canonical,
        Err(reason) => {
            debug!(tenant_id = %tenant.tenant_id, reason = %reason, "alert rejected at boundary");
            return StatusCode::BAD_REQUEST;
        }
    };

    let Some(severity) = Severity::parse(&canonical.severity) else {
        return StatusCode::BAD_REQUEST;
    };
    let alert = Alert {
        id: canonical.id,
        tenant_id: tenant.tenant_id.clone(),
        asset: canonical.asset,
        signature: canonical.signature,
        severity,
        message: canonical.message,
        source: canonical.source,
        status: AlertStatus::Active,
        incident_id: None,
        received_at: canonical.occurred_at,
        archived: false,
    };

    match state.engine.ingest_alert(alert, now()) {
        Ok(_) => StatusCode::ACCEPTED,
        Err(EngineError::InvalidAlert(reason)) => {
            debug!(tenant_id = %tenant.tenant_id, reason = %reason, "alert rejected at boundary");
            StatusCode::BAD_REQUEST
        }
        Err(err) => {
            warn!(tenant_id = %tenant.tenant_id, error = %err, "alert ingestion failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_adapter_normalizes_and_validates() {
        let payload = serde_json::json!({
            "id": "a-1",
            "asset": "web-01",
            "signature": "Disk Full",
            "severity": "critical",
            "message": "disk usage at 99%",
            "source": "datadog",
            "occurred_at": 1_700_000_000,
        });
        let alert = GenericAdapter.parse(&payload).expect("parse");
        assert_eq!(alert.signature, "disk_full");
        assert_eq!(alert.severity, "critical");
    }

    #[test]
    fn generic_adapter_rejects_missing_asset() {
        let payload = serde_json::json!({"id": "a-1", "signature": "disk_full"});
        assert!(GenericAdapter.parse(&payload).is_err());
    }

    #[test]
    fn alertmanager_adapter_walks_the_payload() {
        let payload = serde_json::json!({
            "alerts": [{
                "fingerprint": "abc123",
                "labels": {
                    "alertname": "DiskFull",
                    "instance": "web-01:9100",
                    "severity": "high",
                },
                "annotations": {"summary": "disk almost full"},
            }],
        });
        let alert = AlertmanagerAdapter.parse(&payload).expect("parse");
        assert_eq!(alert.id, "abc123");
        assert_eq!(alert.signature, "diskfull");
        assert_eq!(alert.asset, "web-01:9100");
        assert_eq!(alert.source, "alertmanager");
    }

    #[test]
    fn alertmanager_adapter_requires_alerts() {
        assert!(AlertmanagerAdapter
            .parse(&serde_json::json!({"alerts": []}))
            .is_err());
    }
}
