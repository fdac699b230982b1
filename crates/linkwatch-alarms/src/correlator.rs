//! Alarm correlator — merges the alarm feed into endpoint records.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use linkwatch_state::{
    AlarmSignal, AlarmState, AlarmStatus, EndpointFilter, EndpointId, EndpointRegistry,
    EndpointType, NetworkEndpoint, SnapshotStore,
};

use crate::error::AlarmResult;
use crate::feed::{normalize_alarms, AlarmFeed};

pub const DEFAULT_ALARM_INTERVAL: Duration = Duration::from_secs(30);

/// Number of active alarms of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmTypeCount {
    pub alarm_type: String,
    pub count: usize,
}

/// Summary of one successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRefresh {
    /// ATMs now in ALARM.
    pub alarming: usize,
    /// Valid alarms received from the feed.
    pub alarms: usize,
    pub breakdown: Vec<AlarmTypeCount>,
    pub refreshed_at: DateTime<Utc>,
}

/// Match alarms to endpoints by device code.
///
/// An ATM is `ALARM` when at least one alarm carries its code (compared
/// trimmed and case-insensitively). Branches are always `ONLINE`.
pub fn merge_alarms(
    endpoints: &[NetworkEndpoint],
    alarms: &[AlarmSignal],
    now: DateTime<Utc>,
) -> HashMap<EndpointId, AlarmState> {
    let mut by_code: HashMap<String, Vec<AlarmSignal>> = HashMap::new();
    for alarm in alarms {
        by_code
            .entry(alarm.device_code.trim().to_lowercase())
            .or_default()
            .push(alarm.clone());
    }

    endpoints
        .iter()
        .map(|endpoint| {
            let current_alarms = match endpoint.endpoint_type {
                EndpointType::Atm => by_code
                    .get(&endpoint.code.trim().to_lowercase())
                    .cloned()
                    .unwrap_or_default(),
                EndpointType::Branch => Vec::new(),
            };
            let alarm_status = if current_alarms.is_empty() {
                AlarmStatus::Online
            } else {
                AlarmStatus::Alarm
            };
            (
                endpoint.id.clone(),
                AlarmState {
                    alarm_status,
                    current_alarms,
                    last_alarm_update: Some(now),
                },
            )
        })
        .collect()
}

/// Count alarms per type, most frequent first.
pub fn alarm_type_breakdown(alarms: &[AlarmSignal]) -> Vec<AlarmTypeCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for alarm in alarms {
        *counts.entry(alarm.alarm_type.as_str()).or_default() += 1;
    }
    let mut breakdown: Vec<AlarmTypeCount> = counts
        .into_iter()
        .map(|(alarm_type, count)| AlarmTypeCount {
            alarm_type: alarm_type.to_string(),
            count,
        })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.alarm_type.cmp(&b.alarm_type)));
    breakdown
}

/// Periodically correlates the alarm feed with the endpoint list.
pub struct AlarmCorrelator {
    feed: Arc<dyn AlarmFeed>,
    store: SnapshotStore,
    interval: Duration,
}

impl AlarmCorrelator {
    pub fn new(feed: Arc<dyn AlarmFeed>, store: SnapshotStore) -> Self {
        Self {
            feed,
            store,
            interval: DEFAULT_ALARM_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Fetch the feed and write alarm fields for `endpoints`.
    ///
    /// On a feed error nothing is written and the previous alarm state of
    /// every endpoint stays as it was.
    pub async fn refresh(&self, endpoints: &[NetworkEndpoint]) -> AlarmResult<AlarmRefresh> {
        let raw = match self.feed.list_current_alarms().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "alarm feed failed, keeping previous alarm state");
                return Err(e);
            }
        };

        let now = Utc::now();
        let alarms = normalize_alarms(raw, now);
        let merged = merge_alarms(endpoints, &alarms, now);

        let mut alarming = 0;
        for endpoint in endpoints {
            if let Some(state) = merged.get(&endpoint.id) {
                if state.alarm_status == AlarmStatus::Alarm {
                    alarming += 1;
                }
                self.store
                    .update_alarm(endpoint, |alarm| *alarm = state.clone());
            }
        }

        debug!(alarms = alarms.len(), alarming, "alarm state merged");
        Ok(AlarmRefresh {
            alarming,
            alarms: alarms.len(),
            breakdown: alarm_type_breakdown(&alarms),
            refreshed_at: now,
        })
    }

    /// Refresh on a fixed cadence until shutdown.
    ///
    /// The endpoint list is re-read from the registry every cycle; a
    /// registry failure skips the cycle.
    pub async fn run(
        &self,
        registry: Arc<dyn EndpointRegistry>,
        filter: EndpointFilter,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_secs = self.interval.as_secs(), "alarm correlator started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match registry.list_endpoints(&filter).await {
                        Ok(endpoints) => {
                            // Failures are logged inside refresh.
                            let _ = self.refresh(&endpoints).await;
                        }
                        Err(e) => warn!(error = %e, "alarm cycle skipped, registry unavailable"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("alarm correlator shutting down");
                    break;
                }
            }
        }
    }
}
