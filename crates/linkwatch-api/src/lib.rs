//! linkwatch-api — REST API for linkwatch.
//!
//! Provides axum route handlers for controlling the probe scheduler,
//! reading endpoint snapshots and fleet statistics, and requesting
//! incident tickets.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/scheduler` | Scheduler status |
//! | POST | `/api/v1/scheduler/start` | Start monitoring (registry fetch) |
//! | POST | `/api/v1/scheduler/stop` | Stop monitoring |
//! | POST | `/api/v1/scheduler/skip` | Skip to the next endpoint |
//! | PUT | `/api/v1/scheduler/settings` | Change delay preset / skip-offline |
//! | GET | `/api/v1/snapshots` | All endpoint records |
//! | GET | `/api/v1/snapshots/{id}` | One endpoint record |
//! | GET | `/api/v1/stats` | Fleet statistics |
//! | GET | `/api/v1/dashboard` | Last dashboard view |
//! | POST | `/api/v1/tickets` | Ticket one endpoint |
//! | POST | `/api/v1/tickets/unhealthy` | Ticket every unhealthy endpoint |
//! | GET | `/metrics` | Prometheus exposition |

pub mod dashboard;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tokio::sync::watch;

use linkwatch_incident::IncidentBridge;
use linkwatch_scheduler::ProbeScheduler;
use linkwatch_state::{EndpointFilter, EndpointRegistry, SnapshotStore};

pub use dashboard::{DashboardRefresher, DashboardView, DEFAULT_DASHBOARD_INTERVAL};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: SnapshotStore,
    pub scheduler: Arc<ProbeScheduler>,
    pub registry: Arc<dyn EndpointRegistry>,
    pub bridge: Arc<IncidentBridge>,
    /// Upstream filter applied when the scheduler is started over HTTP.
    pub filter: EndpointFilter,
    pub dashboard: watch::Receiver<Arc<DashboardView>>,
}

/// Build the complete API router (REST + metrics).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/scheduler", get(handlers::scheduler_status))
        .route("/scheduler/start", post(handlers::start_monitoring))
        .route("/scheduler/stop", post(handlers::stop_monitoring))
        .route("/scheduler/skip", post(handlers::skip_endpoint))
        .route("/scheduler/settings", put(handlers::update_settings))
        .route("/snapshots", get(handlers::list_snapshots))
        .route("/snapshots/{id}", get(handlers::get_snapshot))
        .route("/stats", get(handlers::fleet_stats))
        .route("/dashboard", get(handlers::dashboard_view))
        .route("/tickets", post(handlers::create_ticket))
        .route("/tickets/unhealthy", post(handlers::create_unhealthy_tickets))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
}
