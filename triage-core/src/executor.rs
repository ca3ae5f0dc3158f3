//! Execution connector seam. The remote command runner lives outside the
//! engine; the engine submits a request, holds the opaque handle, and
//! learns the result through a completion callback.

use crate::error::{EngineError, Result};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct ExecutionRequest {
    pub incident_id: String,
    pub runbook_id: String,
    pub target_ids: Vec<String>,
}

pub trait ExecutionConnector: Send + Sync {
    /// Submit a runbook for remote execution and return an opaque command
    /// handle. Completion arrives later via the engine's callback surface.
    fn submit(&self, request: &ExecutionRequest) -> Result<String>;
}

/// Stand-in connector for local runs and tests: accepts everything except
/// runbooks whose id contains "fail", which simulates an unreachable
/// target at submit time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimulatedConnector;

impl ExecutionConnector for SimulatedConnector {
    fn submit(&self, request: &ExecutionRequest) -> Result<String> {
        if request.runbook_id.to_lowercase().contains("fail") {
            return Err(EngineError::InvalidAction(
                request.incident_id.clone(),
                format!("simulated submit failure for runbook {}", request.runbook_id),
            ));
        }
        Ok(format!("exec-{}", Uuid::new_v4()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_connector_hands_out_handles() {
        let connector = SimulatedConnector;
        let request = ExecutionRequest {
            incident_id: "inc-1".into(),
            runbook_id: "rb-disk-cleanup".into(),
            target_ids: vec!["web-01".into()],
        };
        let a = connector.submit(&request).expect("submit");
        let b = connector.submit(&request).expect("submit");
        assert_ne!(a, b, "handles are opaque and unique");
    }

    #[test]
    fn simulated_connector_rejects_failing_runbooks() {
        let connector = SimulatedConnector;
        let request = ExecutionRequest {
            incident_id: "inc-1".into(),
            runbook_id: "rb-always-fails".into(),
            target_ids: vec!["web-01".into()],
        };
        assert!(connector.submit(&request).is_err());
    }
}
