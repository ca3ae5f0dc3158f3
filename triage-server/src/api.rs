//! Engine trigger, approval, configuration, and read endpoints.

use crate::dto::{
    AvailabilityRequest, CompleteExecutionRequest, IncidentDto, TechnicianRequest,
    TimelineEventDto,
};
use crate::state::{now, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use triage_core::config::TenantConfig;
use triage_core::model::Technician;
use triage_core::EngineError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/tenants/:id/config", get(get_tenant).put(put_tenant))
        .route("/tenants/:id", delete(delete_tenant))
        .route("/tenants/:id/correlate", post(run_correlation))
        .route("/tenants/:id/incidents", get(list_incidents))
        .route("/incidents/:id/decide", post(run_decision))
        .route("/incidents/:id/approve", post(approve))
        .route("/incidents/:id/reject", post(reject))
        .route("/incidents/:id/escalate", post(escalate))
        .route("/incidents/:id/resolve", post(resolve))
        .route("/incidents/:id/events", get(incident_events))
        .route("/executions/:handle/complete", post(complete_execution))
        .route("/technicians", post(add_technician))
        .route("/technicians/:id/availability", put(set_availability))
}

struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::UnknownTenant(_)
            | EngineError::UnknownIncident(_)
            | EngineError::UnknownTechnician(_)
            | EngineError::UnknownExecution(_)
            | EngineError::NoDecision(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidAlert(_) => StatusCode::BAD_REQUEST,
            EngineError::InvalidAction(_, _) => StatusCode::CONFLICT,
            EngineError::Storage(_) | EngineError::Serde(_) | EngineError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({"error": self.0.to_string()}));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn get_tenant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TenantConfig>> {
    let tenant = state
        .engine
        .store()
        .tenant(&id)?
        .ok_or(EngineError::UnknownTenant(id))?;
    Ok(Json(tenant))
}

async fn put_tenant(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut cfg): Json<TenantConfig>,
) -> ApiResult<Json<TenantConfig>> {
    cfg.tenant_id = id;
    state.engine.upsert_tenant(&cfg)?;
    Ok(Json(cfg))
}

async fn delete_tenant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.engine.delete_tenant(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(EngineError::UnknownTenant(id).into())
    }
}

async fn run_correlation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<triage_core::correlation::CorrelationOutcome>> {
    let outcome = state.engine.run_correlation(&id, now())?;
    Ok(Json(outcome))
}

async fn list_incidents(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<IncidentDto>>> {
    if state.engine.store().tenant(&id)?.is_none() {
        return Err(EngineError::UnknownTenant(id).into());
    }
    let incidents = state
        .engine
        .store()
        .incidents_for_tenant(&id)?
        .into_iter()
        .map(IncidentDto::from)
        .collect();
    Ok(Json(incidents))
}

async fn run_decision(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<triage_core::model::Decision>> {
    let decision = state.engine.run_decision(&id, now())?;
    Ok(Json(decision))
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<triage_core::model::Decision>> {
    let decision = state.engine.approve(&id, now())?;
    Ok(Json(decision))
}

async fn reject(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.engine.reject(&id, now())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn escalate(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.engine.escalate_manual(&id, now())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn resolve(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.engine.resolve(&id, now())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn incident_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TimelineEventDto>>> {
    if state.engine.store().incident(&id)?.is_none() {
        return Err(EngineError::UnknownIncident(id).into());
    }
    let events = state
        .engine
        .event_log()
        .events_for_incident(&id)?
        .into_iter()
        .map(TimelineEventDto::from)
        .collect();
    Ok(Json(events))
}

async fn complete_execution(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Json(body): Json<CompleteExecutionRequest>,
) -> ApiResult<StatusCode> {
    let success = match body.status.as_str() {
        "success" => true,
        "failure" => false,
        other => {
            return Err(EngineError::InvalidAction(
                handle,
                format!("unknown execution status '{other}'"),
            )
            .into())
        }
    };
    state
        .engine
        .complete_execution(&handle, success, body.duration_secs, now())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_technician(
    State(state): State<AppState>,
    Json(body): Json<TechnicianRequest>,
) -> ApiResult<StatusCode> {
    state.engine.add_technician(&Technician {
        id: body.id,
        name: body.name,
        skills: body.skills,
        workload: 0,
        available: true,
        last_assigned_at: None,
    })?;
    Ok(StatusCode::CREATED)
}

async fn set_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AvailabilityRequest>,
) -> ApiResult<StatusCode> {
    state
        .engine
        .set_technician_availability(&id, body.available, now())?;
    Ok(StatusCode::NO_CONTENT)
}
