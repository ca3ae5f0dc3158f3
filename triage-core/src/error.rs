use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown tenant '{0}'")]
    UnknownTenant(String),

    #[error("unknown incident '{0}'")]
    UnknownIncident(String),

    #[error("unknown technician '{0}'")]
    UnknownTechnician(String),

    #[error("unknown execution handle '{0}'")]
    UnknownExecution(String),

    #[error("incident '{0}' has no recorded decision")]
    NoDecision(String),

    #[error("invalid alert: {0}")]
    InvalidAlert(String),

    #[error("invalid action for incident '{0}': {1}")]
    InvalidAction(String, String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
