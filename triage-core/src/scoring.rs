//! Priority scoring. A pure function of incident attributes and the clock;
//! recomputed whenever membership changes and on every scheduled
//! re-evaluation pass, since the age term is time-dependent.
//!
//! score = severity + critical-asset bonus + duplicate factor
//!         + multi-tool corroboration - age decay, clamped to [0, 100].

use crate::model::Severity;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

const SEVERITY_WEIGHT_LOW: f64 = 15.0;
const SEVERITY_WEIGHT_MEDIUM: f64 = 30.0;
const SEVERITY_WEIGHT_HIGH: f64 = 45.0;
const SEVERITY_WEIGHT_CRITICAL: f64 = 60.0;

const CRITICAL_ASSET_BONUS: f64 = 15.0;

// Sub-linear growth so a flood of duplicates cannot dwarf severity:
// ln(10) * 6 ~= 13.8, ln(50) * 6 ~= 23.5 before the cap.
const DUPLICATE_SCALE: f64 = 6.0;
const DUPLICATE_CAP: f64 = 20.0;

const MULTI_TOOL_BONUS_PER_SOURCE: f64 = 5.0;
const MULTI_TOOL_CAP: f64 = 10.0;

const AGE_DECAY_PER_MINUTE: f64 = 0.1;
const AGE_DECAY_CAP: f64 = 25.0;

pub fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Low => SEVERITY_WEIGHT_LOW,
        Severity::Medium => SEVERITY_WEIGHT_MEDIUM,
        Severity::High => SEVERITY_WEIGHT_HIGH,
        Severity::Critical => SEVERITY_WEIGHT_CRITICAL,
    }
}

fn duplicate_factor(alert_count: u32) -> f64 {
    let count = alert_count.max(1) as f64;
    (count.ln() * DUPLICATE_SCALE).min(DUPLICATE_CAP)
}

fn multi_tool_bonus(tool_source_count: usize) -> f64 {
    let extra_sources = tool_source_count.saturating_sub(1) as f64;
    (extra_sources * MULTI_TOOL_BONUS_PER_SOURCE).min(MULTI_TOOL_CAP)
}

fn age_decay(created_at: i64, now: i64) -> f64 {
    let age_minutes = (now - created_at).max(0) as f64 / 60.0;
    (age_minutes * AGE_DECAY_PER_MINUTE).min(AGE_DECAY_CAP)
}

pub fn score(
    severity: Severity,
    critical_asset: bool,
    alert_count: u32,
    tool_source_count: usize,
    created_at: i64,
    now: i64,
) -> f64 {
    let mut score = severity_weight(severity);
    if critical_asset {
        score += CRITICAL_ASSET_BONUS;
    }
    score += duplicate_factor(alert_count);
    score += multi_tool_bonus(tool_source_count);
    score -= age_decay(created_at, now);
    score.clamp(SCORE_MIN, SCORE_MAX)
}
