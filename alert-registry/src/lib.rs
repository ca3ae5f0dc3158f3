use serde::{Deserialize, Serialize};

pub const ALERT_SCHEMA_V1: &str = "alert.v1";

const VALID_SEVERITIES: [&str; 4] = ["low", "medium", "high", "critical"];

/// Canonical wire form of one raw monitoring signal, as accepted at the
/// ingestion boundary. Source-specific payloads are mapped into this shape
/// by an adapter before anything touches the alert store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalAlertV1 {
    pub schema: String,
    pub id: String,
    pub asset: String,
    pub signature: String,
    pub severity: String,
    pub message: String,
    pub source: String,
    pub occurred_at: i64,
}

pub fn validate_alert_v1(alert: &CanonicalAlertV1) -> Result<(), String> {
    if alert.schema != ALERT_SCHEMA_V1 {
        return Err(format!("unsupported schema '{}'", alert.schema));
    }
    if alert.id.trim().is_empty() {
        return Err("id is required".into());
    }
    if alert.asset.trim().is_empty() {
        return Err("asset is required".into());
    }
    if alert.signature.trim().is_empty() {
        return Err("signature is required".into());
    }
    if !VALID_SEVERITIES.contains(&alert.severity.to_lowercase().as_str()) {
        return Err(format!("invalid severity '{}'", alert.severity));
    }
    if alert.occurred_at < 0 {
        return Err("occurred_at must be a unix timestamp".into());
    }
    Ok(())
}

/// Normalize a free-form fault identifier into a grouping signature:
/// lowercased, with whitespace collapsed to underscores.
pub fn normalize_signature(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
