//! Dashboard view — a periodically rebuilt picture of the monitored fleet.
//!
//! Each refresh re-reads the registry and publishes a new immutable
//! `DashboardView` through a `watch` channel. Readers always see one whole
//! view; a view is never edited in place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use linkwatch_metrics::{aggregate, FleetStats};
use linkwatch_scheduler::ProbeScheduler;
use linkwatch_state::{
    EndpointFilter, EndpointId, EndpointRecord, EndpointRegistry, NetworkEndpoint, RegistryError,
    SnapshotStore,
};

pub const DEFAULT_DASHBOARD_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardView {
    pub endpoints: Vec<NetworkEndpoint>,
    pub records: HashMap<EndpointId, EndpointRecord>,
    pub stats: FleetStats,
    /// `None` until the first successful refresh.
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Rebuilds the dashboard view on a fixed interval.
///
/// While the scheduler is running, a changed registry listing is also
/// handed to it so the next pass walks the new list.
pub struct DashboardRefresher {
    registry: Arc<dyn EndpointRegistry>,
    filter: EndpointFilter,
    store: SnapshotStore,
    scheduler: Arc<ProbeScheduler>,
    interval: Duration,
    view: watch::Sender<Arc<DashboardView>>,
}

impl DashboardRefresher {
    pub fn new(
        registry: Arc<dyn EndpointRegistry>,
        filter: EndpointFilter,
        store: SnapshotStore,
        scheduler: Arc<ProbeScheduler>,
    ) -> Self {
        let (view, _) = watch::channel(Arc::new(DashboardView::default()));
        Self {
            registry,
            filter,
            store,
            scheduler,
            interval: DEFAULT_DASHBOARD_INTERVAL,
            view,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardView>> {
        self.view.subscribe()
    }

    /// Re-read the registry and publish a new view.
    ///
    /// On a registry failure the previous view stays published.
    pub async fn refresh(&self) -> Result<Arc<DashboardView>, RegistryError> {
        let endpoints = self.registry.list_endpoints(&self.filter).await?;
        self.store.register_endpoints(&endpoints);

        if self.scheduler.is_running() && self.scheduler.endpoints().as_slice() != endpoints.as_slice() {
            self.scheduler.replace_endpoints(endpoints.clone());
        }

        let snapshot = self.store.snapshot();
        let records: HashMap<EndpointId, EndpointRecord> = endpoints
            .iter()
            .filter_map(|e| snapshot.get(&e.id).map(|r| (e.id.clone(), r.clone())))
            .collect();
        let stats = aggregate(records.values(), self.scheduler.cycle_count());

        let view = Arc::new(DashboardView {
            endpoints,
            records,
            stats,
            refreshed_at: Some(Utc::now()),
        });
        self.view.send_replace(view.clone());
        debug!(
            endpoints = view.endpoints.len(),
            online = view.stats.online,
            down = view.stats.down(),
            "dashboard view refreshed"
        );
        Ok(view)
    }

    /// Refresh on a fixed cadence until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "dashboard refresher started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!(error = %e, "dashboard refresh failed, keeping previous view");
                    }
                }
                _ = shutdown.changed() => {
                    info!("dashboard refresher shutting down");
                    break;
                }
            }
        }
    }
}
