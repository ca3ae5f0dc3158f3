//! Runbook catalog. Runbooks are managed by an external catalog service;
//! the engine only reads them. Lookup prefers an exact signature match and
//! falls back to the incident's category. An unreachable catalog is
//! treated by the caller as "no applicable runbook", never as a pipeline
//! failure.

use crate::error::Result;
use crate::model::{RiskLevel, Runbook};

pub trait RunbookCatalog: Send + Sync {
    fn find_for(&self, signature: &str, category: &str) -> Result<Option<Runbook>>;
}

pub struct StaticCatalog {
    runbooks: Vec<Runbook>,
}

impl StaticCatalog {
    pub fn new(runbooks: Vec<Runbook>) -> Self {
        Self { runbooks }
    }

    /// The stock remediation set shipped with the engine.
    pub fn builtin() -> Self {
        Self::new(vec![
            Runbook {
                id: "rb-disk-cleanup".into(),
                signature: "disk_full".into(),
                category: "storage".into(),
                risk: RiskLevel::Low,
                requires_approval: false,
            },
            Runbook {
                id: "rb-service-restart".into(),
                signature: "service_down".into(),
                category: "compute".into(),
                risk: RiskLevel::Low,
                requires_approval: false,
            },
            Runbook {
                id: "rb-worker-scaleout".into(),
                signature: "queue_backlog".into(),
                category: "compute".into(),
                risk: RiskLevel::Medium,
                requires_approval: true,
            },
            Runbook {
                id: "rb-interface-reset".into(),
                signature: "interface_flap".into(),
                category: "network".into(),
                risk: RiskLevel::High,
                requires_approval: true,
            },
        ])
    }
}

impl RunbookCatalog for StaticCatalog {
    fn find_for(&self, signature: &str, category: &str) -> Result<Option<Runbook>> {
        let by_signature = self
            .runbooks
            .iter()
            .find(|rb| rb.signature.eq_ignore_ascii_case(signature));
        if let Some(runbook) = by_signature {
            return Ok(Some(runbook.clone()));
        }
        Ok(self
            .runbooks
            .iter()
            .find(|rb| rb.category.eq_ignore_ascii_case(category) && rb.risk == RiskLevel::Low)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_signature_match_wins() {
        let catalog = StaticCatalog::builtin();
        let runbook = catalog
            .find_for("disk_full", "storage")
            .expect("lookup")
            .expect("runbook");
        assert_eq!(runbook.id, "rb-disk-cleanup");
        assert_eq!(runbook.risk, RiskLevel::Low);
    }

    #[test]
    fn category_fallback_only_offers_low_risk() {
        let catalog = StaticCatalog::builtin();
        // Unknown compute signature falls back to the category's low-risk
        // procedure, never to a medium/high-risk one.
        let runbook = catalog
            .find_for("cpu_pegged", "compute")
            .expect("lookup")
            .expect("runbook");
        assert_eq!(runbook.id, "rb-service-restart");
    }

    #[test]
    fn unknown_signature_and_category_yields_none() {
        let catalog = StaticCatalog::builtin();
        assert!(catalog
            .find_for("quantum_flux", "generic")
            .expect("lookup")
            .is_none());
    }
}
