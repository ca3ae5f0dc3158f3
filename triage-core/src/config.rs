use crate::model::AssignmentStrategy;
use serde::{Deserialize, Serialize};

/// Correlation windows outside this range behave pathologically: shorter
/// windows shred one fault into many incidents, longer ones merge unrelated
/// recurrences.
pub const WINDOW_MIN_MINUTES: i64 = 5;
pub const WINDOW_MAX_MINUTES: i64 = 15;

pub const DEFAULT_WINDOW_MINUTES: i64 = 10;
pub const DEFAULT_SLA_MINUTES: i64 = 30;
pub const DEFAULT_DECIDE_INTERVAL_SECS: u64 = 60;

/// Per-tenant engine settings. An explicit record passed into every engine
/// invocation; tenants stay isolated and the engine stays parallelizable
/// across them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub api_key: String,
    pub auto_correlate: bool,
    pub window_minutes: i64,
    pub auto_decide: bool,
    pub decide_interval_secs: u64,
    pub sla_minutes: i64,
    pub auto_approve: bool,
    pub assignment_strategy: AssignmentStrategy,
    pub critical_assets: Vec<String>,
}

impl TenantConfig {
    pub fn new(tenant_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            api_key: api_key.into(),
            auto_correlate: true,
            window_minutes: DEFAULT_WINDOW_MINUTES,
            auto_decide: true,
            decide_interval_secs: DEFAULT_DECIDE_INTERVAL_SECS,
            sla_minutes: DEFAULT_SLA_MINUTES,
            auto_approve: true,
            assignment_strategy: AssignmentStrategy::SkillBased,
            critical_assets: Vec::new(),
        }
    }

    /// Correlation window in seconds, clamped to the sane range.
    pub fn window_secs(&self) -> i64 {
        self.window_minutes
            .clamp(WINDOW_MIN_MINUTES, WINDOW_MAX_MINUTES)
            * 60
    }

    pub fn sla_secs(&self) -> i64 {
        self.sla_minutes.max(1) * 60
    }

    pub fn is_critical_asset(&self, asset: &str) -> bool {
        self.critical_assets
            .iter()
            .any(|a| a.eq_ignore_ascii_case(asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_clamped_to_sane_range() {
        let mut cfg = TenantConfig::new("t1", "key");
        cfg.window_minutes = 1;
        assert_eq!(cfg.window_secs(), WINDOW_MIN_MINUTES * 60);
        cfg.window_minutes = 60;
        assert_eq!(cfg.window_secs(), WINDOW_MAX_MINUTES * 60);
        cfg.window_minutes = 12;
        assert_eq!(cfg.window_secs(), 12 * 60);
    }

    #[test]
    fn critical_asset_match_is_case_insensitive() {
        let mut cfg = TenantConfig::new("t1", "key");
        cfg.critical_assets = vec!["DB-01".into()];
        assert!(cfg.is_critical_asset("db-01"));
        assert!(!cfg.is_critical_asset("web-01"));
    }
}
