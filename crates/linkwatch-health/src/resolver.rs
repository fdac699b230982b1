//! Status resolver — folds probe results into endpoint runtime state.
//!
//! Tracks status transitions, downtime and uptime for each endpoint. The
//! resolver is the only writer of the ping half of an `EndpointRecord`.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use linkwatch_state::{
    EndpointRuntimeState, EndpointStatus, HealthCheckResult, NetworkEndpoint, SnapshotStore,
    StatusPeriod, STATUS_HISTORY_LIMIT,
};

/// What changed when a result was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub previous: EndpointStatus,
    pub current: EndpointStatus,
}

impl StatusTransition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    pub fn went_down(&self) -> bool {
        !self.previous.is_down() && self.current.is_down()
    }

    pub fn recovered(&self) -> bool {
        self.previous.is_down() && !self.current.is_down()
    }
}

/// Applies health check results to the snapshot store.
#[derive(Clone)]
pub struct StatusResolver {
    store: SnapshotStore,
}

impl StatusResolver {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Apply one completed probe result at `now`.
    pub fn apply(
        &self,
        endpoint: &NetworkEndpoint,
        result: &HealthCheckResult,
        now: DateTime<Utc>,
    ) -> StatusTransition {
        let (transition, downtime) = self.store.update_ping(endpoint, |state| {
            let transition = record(state, result, now);
            (transition, state.current_downtime_seconds)
        });

        let endpoint_id = &endpoint.id;
        let code = &endpoint.code;
        if transition.went_down() {
            info!(
                %endpoint_id,
                %code,
                status = %transition.current,
                error = result.error_message.as_deref().unwrap_or(""),
                "endpoint went down"
            );
        } else if transition.recovered() {
            info!(
                %endpoint_id,
                %code,
                from = %transition.previous,
                status = %transition.current,
                "endpoint recovered"
            );
        } else if transition.changed() {
            debug!(
                %endpoint_id,
                %code,
                from = %transition.previous,
                status = %transition.current,
                "endpoint status changed"
            );
        } else if transition.current.is_down() {
            debug!(%endpoint_id, %code, status = %transition.current, downtime, "endpoint still down");
        }

        transition
    }

    /// Recompute `current_downtime_seconds` of every down endpoint.
    pub fn refresh_downtime(&self, now: DateTime<Utc>) {
        self.store.update_all_pings(|state| {
            state.current_downtime_seconds = state
                .down_since
                .map(|since| seconds_between(since, now))
                .unwrap_or(0);
        });
    }
}

/// Fold a result into the state. Pure apart from the state mutation.
fn record(
    state: &mut EndpointRuntimeState,
    result: &HealthCheckResult,
    now: DateTime<Utc>,
) -> StatusTransition {
    let previous = state.status;
    let current = result.status;

    state.observations += 1;
    if current == EndpointStatus::Online {
        state.online_observations += 1;
    }
    state.uptime_percentage = state.online_observations as f64 / state.observations as f64 * 100.0;

    state.last_checked_at = Some(result.checked_at);
    state.last_response_time_ms = result.response_time_ms;
    state.last_packet_loss = result.packet_loss;
    state.last_error_message = result.error_message.clone();
    state.last_ip_address = Some(result.ip_address.clone());
    state.last_ip_role = Some(result.ip_role);

    if previous != current {
        state.status = current;
        state.previous_status = Some(previous);
        state.status_changed_at = Some(now);
        push_period(&mut state.history, current, now);
    }

    if current.is_down() {
        let since = *state.down_since.get_or_insert(now);
        state.current_downtime_seconds = seconds_between(since, now);
    } else {
        if let Some(since) = state.down_since.take() {
            state.total_downtime_seconds += seconds_between(since, now);
        }
        state.current_downtime_seconds = 0;
    }

    StatusTransition { previous, current }
}

fn push_period(history: &mut Vec<StatusPeriod>, status: EndpointStatus, now: DateTime<Utc>) {
    if let Some(open) = history.last_mut().filter(|p| p.ended_at.is_none()) {
        open.ended_at = Some(now);
        open.duration_seconds = Some(seconds_between(open.started_at, now));
    }
    history.push(StatusPeriod {
        status,
        started_at: now,
        ended_at: None,
        duration_seconds: None,
    });
    if history.len() > STATUS_HISTORY_LIMIT {
        let excess = history.len() - STATUS_HISTORY_LIMIT;
        history.drain(..excess);
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use linkwatch_state::IpRole;

    fn endpoint() -> NetworkEndpoint {
        NetworkEndpoint::branch("br-1", "001", "10.0.0.1")
    }

    fn result(status: EndpointStatus, at: DateTime<Utc>) -> HealthCheckResult {
        HealthCheckResult {
            endpoint_id: "br-1".to_string(),
            status,
            response_time_ms: (status == EndpointStatus::Online).then_some(25),
            packet_loss: Some(0.0),
            error_message: status.is_down().then(|| "Request timed out".to_string()),
            checked_at: at,
            ip_address: "10.0.0.1".to_string(),
            ip_role: IpRole::Primary,
        }
    }

    fn resolver() -> StatusResolver {
        let store = SnapshotStore::new();
        store.register_endpoints(&[endpoint()]);
        StatusResolver::new(store)
    }

    fn ping(resolver: &StatusResolver) -> EndpointRuntimeState {
        resolver.store().get("br-1").unwrap().ping
    }

    #[test]
    fn first_result_leaves_unverified() {
        let resolver = resolver();
        let t0 = Utc::now();
        let transition = resolver.apply(&endpoint(), &result(EndpointStatus::Online, t0), t0);

        assert_eq!(transition.previous, EndpointStatus::Unverified);
        assert!(transition.changed());
        let state = ping(&resolver);
        assert_eq!(state.status, EndpointStatus::Online);
        assert_eq!(state.previous_status, Some(EndpointStatus::Unverified));
        assert_eq!(state.status_changed_at, Some(t0));
        assert!(state.down_since.is_none());
        assert_eq!(state.uptime_percentage, 100.0);
    }

    #[test]
    fn repeated_status_does_not_restamp_change() {
        let resolver = resolver();
        let t0 = Utc::now();
        resolver.apply(&endpoint(), &result(EndpointStatus::Online, t0), t0);
        let t1 = t0 + Duration::seconds(5);
        let transition = resolver.apply(&endpoint(), &result(EndpointStatus::Online, t1), t1);

        assert!(!transition.changed());
        let state = ping(&resolver);
        assert_eq!(state.status_changed_at, Some(t0));
        assert_eq!(state.last_checked_at, Some(t1));
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn going_down_stamps_down_since_and_tracks_downtime() {
        let resolver = resolver();
        let t0 = Utc::now();
        resolver.apply(&endpoint(), &result(EndpointStatus::Online, t0), t0);

        let t1 = t0 + Duration::seconds(10);
        let transition = resolver.apply(&endpoint(), &result(EndpointStatus::Offline, t1), t1);
        assert!(transition.went_down());
        assert_eq!(ping(&resolver).down_since, Some(t1));

        // Moving within the down set keeps the original down_since.
        let t2 = t1 + Duration::seconds(30);
        resolver.apply(&endpoint(), &result(EndpointStatus::Timeout, t2), t2);
        let state = ping(&resolver);
        assert_eq!(state.down_since, Some(t1));
        assert_eq!(state.current_downtime_seconds, 30);
        assert_eq!(state.previous_status, Some(EndpointStatus::Offline));
    }

    #[test]
    fn recovery_clears_down_since_and_folds_total() {
        let resolver = resolver();
        let t0 = Utc::now();
        resolver.apply(&endpoint(), &result(EndpointStatus::Error, t0), t0);
        assert!(ping(&resolver).down_since.is_some());

        let t1 = t0 + Duration::seconds(90);
        let transition = resolver.apply(&endpoint(), &result(EndpointStatus::Slow, t1), t1);
        assert!(transition.recovered());

        let state = ping(&resolver);
        assert!(state.down_since.is_none());
        assert_eq!(state.current_downtime_seconds, 0);
        assert_eq!(state.total_downtime_seconds, 90);
    }

    #[test]
    fn down_since_tracks_down_set_membership() {
        let resolver = resolver();
        let mut now = Utc::now();
        let sequence = [
            EndpointStatus::Online,
            EndpointStatus::Offline,
            EndpointStatus::Error,
            EndpointStatus::Slow,
            EndpointStatus::Timeout,
            EndpointStatus::Online,
        ];
        for status in sequence {
            now += Duration::seconds(3);
            resolver.apply(&endpoint(), &result(status, now), now);
            let state = ping(&resolver);
            assert_eq!(state.down_since.is_some(), status.is_down(), "after {status}");
        }
    }

    #[test]
    fn uptime_is_online_observation_ratio() {
        let resolver = resolver();
        let now = Utc::now();
        for status in [
            EndpointStatus::Online,
            EndpointStatus::Slow,
            EndpointStatus::Online,
            EndpointStatus::Offline,
        ] {
            resolver.apply(&endpoint(), &result(status, now), now);
        }
        let state = ping(&resolver);
        assert_eq!(state.observations, 4);
        assert_eq!(state.online_observations, 2);
        assert_eq!(state.uptime_percentage, 50.0);
    }

    #[test]
    fn history_closes_periods_and_stays_bounded() {
        let resolver = resolver();
        let t0 = Utc::now();
        resolver.apply(&endpoint(), &result(EndpointStatus::Online, t0), t0);
        let t1 = t0 + Duration::seconds(40);
        resolver.apply(&endpoint(), &result(EndpointStatus::Offline, t1), t1);

        let history = ping(&resolver).history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].ended_at, Some(t1));
        assert_eq!(history[0].duration_seconds, Some(40));
        assert!(history[1].ended_at.is_none());

        let mut now = t1;
        for i in 0..(STATUS_HISTORY_LIMIT * 2) {
            now += Duration::seconds(1);
            let status = if i % 2 == 0 {
                EndpointStatus::Online
            } else {
                EndpointStatus::Offline
            };
            resolver.apply(&endpoint(), &result(status, now), now);
        }
        let history = ping(&resolver).history;
        assert_eq!(history.len(), STATUS_HISTORY_LIMIT);
        assert_eq!(history.iter().filter(|p| p.ended_at.is_none()).count(), 1);
    }

    #[test]
    fn refresh_downtime_only_counts_down_endpoints() {
        let store = SnapshotStore::new();
        let down = endpoint();
        let up = NetworkEndpoint::atm("atm-1", "0126", "10.0.1.1");
        store.register_endpoints(&[down.clone(), up.clone()]);
        let resolver = StatusResolver::new(store);

        let t0 = Utc::now();
        resolver.apply(&down, &result(EndpointStatus::Offline, t0), t0);
        let mut ok = result(EndpointStatus::Online, t0);
        ok.endpoint_id = up.id.clone();
        resolver.apply(&up, &ok, t0);

        resolver.refresh_downtime(t0 + Duration::minutes(2));
        assert_eq!(ping(&resolver).current_downtime_seconds, 120);
        assert_eq!(
            resolver.store().get("atm-1").unwrap().ping.current_downtime_seconds,
            0
        );
    }
}
