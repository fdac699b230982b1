//! Fleet statistics aggregation.
//!
//! Pure functions over endpoint records. Nothing here is persisted.

use serde::{Deserialize, Serialize};
use tracing::trace;

use linkwatch_state::{AlarmStatus, EndpointRecord, EndpointStatus, EndpointType};

/// Counts and averages over the whole monitored fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetStats {
    pub total: usize,
    pub online: usize,
    /// OFFLINE plus TIMEOUT.
    pub offline: usize,
    pub slow: usize,
    pub error: usize,
    pub unverified: usize,
    pub branches: usize,
    pub atms: usize,
    /// Endpoints with at least one active hardware alarm.
    pub alarming: usize,
    /// Mean of the last positive response times, 0 when there are none.
    pub avg_response_time_ms: f64,
    pub cycle_count: u64,
}

impl FleetStats {
    /// Endpoints in the down set.
    pub fn down(&self) -> usize {
        self.offline + self.error
    }
}

/// Aggregate a set of records into `FleetStats`.
pub fn aggregate<'a>(
    records: impl IntoIterator<Item = &'a EndpointRecord>,
    cycle_count: u64,
) -> FleetStats {
    let mut stats = FleetStats {
        cycle_count,
        ..FleetStats::default()
    };
    let mut rtt_sum = 0u64;
    let mut rtt_count = 0u64;

    for record in records {
        stats.total += 1;
        match record.endpoint_type {
            EndpointType::Branch => stats.branches += 1,
            EndpointType::Atm => stats.atms += 1,
        }
        match record.ping.status {
            EndpointStatus::Online => stats.online += 1,
            EndpointStatus::Offline | EndpointStatus::Timeout => stats.offline += 1,
            EndpointStatus::Slow => stats.slow += 1,
            EndpointStatus::Error => stats.error += 1,
            EndpointStatus::Unverified => stats.unverified += 1,
        }
        if record.alarm.alarm_status == AlarmStatus::Alarm {
            stats.alarming += 1;
        }
        if let Some(ms) = record.ping.last_response_time_ms.filter(|ms| *ms > 0) {
            rtt_sum += ms;
            rtt_count += 1;
        }
    }

    if rtt_count > 0 {
        stats.avg_response_time_ms = rtt_sum as f64 / rtt_count as f64;
    }
    trace!(total = stats.total, online = stats.online, "fleet stats aggregated");
    stats
}
