use std::sync::Arc;
use triage_core::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
