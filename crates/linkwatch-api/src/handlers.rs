//! REST API handlers.
//!
//! Each handler works through `ApiState` and returns the JSON envelope
//! `{success, data?, error?}`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use linkwatch_core::ProbeDelay;
use linkwatch_incident::{BulkTicketOutcome, IncidentError, TicketingError};
use linkwatch_metrics::{aggregate, render_prometheus, FleetStats};
use linkwatch_scheduler::SchedulerError;
use linkwatch_state::{EndpointFilter, NetworkEndpoint};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// Stats over the scheduler's current endpoints, or over every stored
/// record before monitoring has a list.
fn current_stats(state: &ApiState) -> FleetStats {
    let snapshot = state.store.snapshot();
    let cycles = state.scheduler.cycle_count();
    let endpoints = state.scheduler.endpoints();
    if endpoints.is_empty() {
        return aggregate(snapshot.values(), cycles);
    }
    aggregate(endpoints.iter().filter_map(|e| snapshot.get(&e.id)), cycles)
}

// ── Scheduler ──────────────────────────────────────────────────

/// GET /api/v1/scheduler
pub async fn scheduler_status(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.scheduler.status())
}

/// POST /api/v1/scheduler/start
pub async fn start_monitoring(State(state): State<ApiState>) -> impl IntoResponse {
    match state
        .scheduler
        .start(state.registry.as_ref(), &state.filter)
        .await
    {
        Ok(_) => ApiResponse::ok(state.scheduler.status()).into_response(),
        Err(SchedulerError::NoEndpoints) => {
            error_response("no endpoints to monitor", StatusCode::UNPROCESSABLE_ENTITY)
                .into_response()
        }
        Err(e @ SchedulerError::Registry(_)) => {
            warn!(error = %e, "monitoring start failed");
            error_response(&e.to_string(), StatusCode::BAD_GATEWAY).into_response()
        }
    }
}

/// POST /api/v1/scheduler/stop
pub async fn stop_monitoring(State(state): State<ApiState>) -> impl IntoResponse {
    state.scheduler.stop();
    ApiResponse::ok(state.scheduler.status())
}

/// POST /api/v1/scheduler/skip
pub async fn skip_endpoint(State(state): State<ApiState>) -> impl IntoResponse {
    if state.scheduler.skip_next() {
        ApiResponse::ok(state.scheduler.status()).into_response()
    } else {
        error_response("monitoring is not running", StatusCode::CONFLICT).into_response()
    }
}

/// Probe delay as either milliseconds or a preset name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DelayInput {
    Millis(u64),
    Preset(String),
}

impl DelayInput {
    fn resolve(&self) -> Result<ProbeDelay, linkwatch_core::ConfigError> {
        match self {
            DelayInput::Millis(ms) => ProbeDelay::try_from(*ms),
            DelayInput::Preset(name) => name.parse(),
        }
    }
}

/// Settings update body. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub delay: Option<DelayInput>,
    #[serde(default)]
    pub skip_offline: Option<bool>,
}

/// PUT /api/v1/scheduler/settings
pub async fn update_settings(
    State(state): State<ApiState>,
    Json(update): Json<SettingsUpdate>,
) -> impl IntoResponse {
    // Validate before applying anything.
    let delay = match update.delay.as_ref().map(DelayInput::resolve).transpose() {
        Ok(delay) => delay,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    };

    if let Some(delay) = delay {
        state.scheduler.set_delay(delay);
    }
    if let Some(skip_offline) = update.skip_offline {
        state.scheduler.set_skip_offline(skip_offline);
    }
    ApiResponse::ok(state.scheduler.settings()).into_response()
}

// ── Snapshots ──────────────────────────────────────────────────

/// GET /api/v1/snapshots
pub async fn list_snapshots(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.store.snapshot())
}

/// GET /api/v1/snapshots/{id}
pub async fn get_snapshot(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&id) {
        Some(record) => ApiResponse::ok(record).into_response(),
        None => error_response("endpoint not found", StatusCode::NOT_FOUND).into_response(),
    }
}

// ── Stats & dashboard ──────────────────────────────────────────

/// GET /api/v1/stats
pub async fn fleet_stats(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(current_stats(&state))
}

/// GET /api/v1/dashboard
pub async fn dashboard_view(State(state): State<ApiState>) -> impl IntoResponse {
    let view = state.dashboard.borrow().clone();
    ApiResponse::ok(view.as_ref()).into_response()
}

// ── Tickets ────────────────────────────────────────────────────

/// Single-ticket request body.
#[derive(Debug, Deserialize)]
pub struct TicketRequest {
    pub endpoint_id: String,
}

/// Endpoints the ticket handlers work on: the scheduler's current list,
/// or a fresh registry listing when monitoring never started.
async fn known_endpoints(state: &ApiState) -> Result<Vec<NetworkEndpoint>, String> {
    let endpoints = state.scheduler.endpoints();
    if !endpoints.is_empty() {
        return Ok(endpoints.as_ref().clone());
    }
    state
        .registry
        .list_endpoints(&state.filter)
        .await
        .map_err(|e| e.to_string())
}

/// POST /api/v1/tickets
pub async fn create_ticket(
    State(state): State<ApiState>,
    Json(req): Json<TicketRequest>,
) -> impl IntoResponse {
    let endpoint = match known_endpoints(&state).await {
        Ok(endpoints) => endpoints.into_iter().find(|e| e.id == req.endpoint_id),
        Err(e) => return error_response(&e, StatusCode::BAD_GATEWAY).into_response(),
    };
    let Some(endpoint) = endpoint else {
        return error_response("endpoint not found", StatusCode::NOT_FOUND).into_response();
    };

    match state.bridge.create_ticket_from_store(&endpoint).await {
        Ok(ticket) => (StatusCode::CREATED, ApiResponse::ok(ticket)).into_response(),
        Err(e @ IncidentError::EndpointNotFound(_)) => {
            error_response(&e.to_string(), StatusCode::NOT_FOUND).into_response()
        }
        Err(e @ IncidentError::NotUnhealthy { .. }) => {
            error_response(&e.to_string(), StatusCode::CONFLICT).into_response()
        }
        Err(IncidentError::Ticketing(e)) => {
            let status = match e {
                TicketingError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                TicketingError::Unavailable(_) | TicketingError::Malformed(_) => {
                    StatusCode::BAD_GATEWAY
                }
            };
            error_response(&e.to_string(), status).into_response()
        }
    }
}

/// POST /api/v1/tickets/unhealthy
pub async fn create_unhealthy_tickets(State(state): State<ApiState>) -> impl IntoResponse {
    let endpoints = match known_endpoints(&state).await {
        Ok(endpoints) => endpoints,
        Err(e) => return error_response(&e, StatusCode::BAD_GATEWAY).into_response(),
    };

    let outcome = state.bridge.create_tickets_for_unhealthy(&endpoints).await;
    if let BulkTicketOutcome::Completed {
        success_count,
        failure_count,
        ..
    } = &outcome
    {
        info!(success_count, failure_count, "bulk ticket request served");
    }
    ApiResponse::ok(outcome).into_response()
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = render_prometheus(&current_stats(&state));
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
