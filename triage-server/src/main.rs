mod api;
mod dto;
mod state;
mod webhook;

use state::{now, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use triage_core::executor::SimulatedConnector;
use triage_core::notify::TracingSink;
use triage_core::runbooks::StaticCatalog;
use triage_core::Engine;

const CORRELATION_TICK: Duration = Duration::from_secs(30);
const DECIDE_TICK: Duration = Duration::from_secs(1);
const ESCALATION_TICK: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path = std::env::var("TRIAGE_DB").unwrap_or_else(|_| "triage.db".into());
    let bind = std::env::var("TRIAGE_BIND").unwrap_or_else(|_| "0.0.0.0:8080".into());

    let engine = Arc::new(
        Engine::open(
            &db_path,
            Arc::new(StaticCatalog::builtin()),
            Arc::new(SimulatedConnector),
            Arc::new(TracingSink),
        )
        .expect("open engine"),
    );

    tokio::spawn(correlation_loop(engine.clone()));
    tokio::spawn(decide_loop(engine.clone()));
    tokio::spawn(escalation_loop(engine.clone()));

    let app_state = AppState { engine };
    let app = api::router()
        .merge(webhook::router())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .expect("bind listener");
    info!(%bind, db = %db_path, "triage-server listening");
    axum::serve(listener, app).await.expect("serve");
}

/// Periodic correlation for tenants with auto-correlate enabled. Reactive
/// correlation on ingestion covers the common path; this tick picks up
/// alerts that arrived while correlation was disabled or raced.
async fn correlation_loop(engine: Arc<Engine>) {
    let mut tick = tokio::time::interval(CORRELATION_TICK);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tick.tick().await;
        let tenants = match engine.store().tenants() {
            Ok(tenants) => tenants,
            Err(err) => {
                error!(error = %err, "correlation loop could not list tenants");
                continue;
            }
        };
        for cfg in tenants.into_iter().filter(|t| t.auto_correlate) {
            if let Err(err) = engine.run_correlation(&cfg.tenant_id, now()) {
                error!(tenant_id = %cfg.tenant_id, error = %err, "periodic correlation failed");
            }
        }
    }
}

/// Per-tenant decide cadence: ticks every second and runs each tenant's
/// sweep when its own configured interval has elapsed. This is the
/// server-side replacement for the reference UI's client-driven polling.
async fn decide_loop(engine: Arc<Engine>) {
    let mut tick = tokio::time::interval(DECIDE_TICK);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_run: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
    loop {
        tick.tick().await;
        let tenants = match engine.store().tenants() {
            Ok(tenants) => tenants,
            Err(err) => {
                error!(error = %err, "decide loop could not list tenants");
                continue;
            }
        };
        let current = now();
        last_run.retain(|tenant_id, _| tenants.iter().any(|t| &t.tenant_id == tenant_id));
        for cfg in tenants.into_iter().filter(|t| t.auto_decide) {
            let due = last_run
                .get(&cfg.tenant_id)
                .map(|last| current - last >= cfg.decide_interval_secs.max(1) as i64)
                .unwrap_or(true);
            if !due {
                continue;
            }
            last_run.insert(cfg.tenant_id.clone(), current);
            if let Err(err) = engine.run_decide_sweep(&cfg.tenant_id, current) {
                error!(tenant_id = %cfg.tenant_id, error = %err, "decide sweep failed");
            }
        }
    }
}

/// One global SLA sweep; the engine's reentrancy guard makes an
/// overlapping run a no-op if a sweep outlives the interval.
async fn escalation_loop(engine: Arc<Engine>) {
    let mut tick = tokio::time::interval(ESCALATION_TICK);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tick.tick().await;
        match engine.sweep_escalations(now()) {
            Ok(outcome) if outcome.escalated > 0 => {
                info!(
                    examined = outcome.examined,
                    escalated = outcome.escalated,
                    "escalation sweep complete"
                );
            }
            Ok(_) => {}
            Err(err) => error!(error = %err, "escalation sweep failed"),
        }
    }
}
