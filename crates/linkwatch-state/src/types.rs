//! Domain types for the linkwatch snapshot store.
//!
//! `NetworkEndpoint` is owned by the external registry and treated as
//! immutable for a session. `EndpointRecord` is the per-endpoint mutable
//! record kept by the store, split into ping fields and alarm fields.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Unique identifier for an endpoint (registry-assigned).
pub type EndpointId = String;

/// Most recent status periods kept per endpoint.
pub const STATUS_HISTORY_LIMIT: usize = 50;

// ── Endpoint ───────────────────────────────────────────────────────

/// Kind of monitored site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointType {
    Branch,
    Atm,
}

impl EndpointType {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointType::Branch => "BRANCH",
            EndpointType::Atm => "ATM",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointType {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BRANCH" => Ok(EndpointType::Branch),
            "ATM" => Ok(EndpointType::Atm),
            other => Err(StateError::UnknownEndpointType(other.to_string())),
        }
    }
}

/// Physical link type of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkMedia {
    /// Satellite.
    Vsat,
    /// Cellular.
    M2m,
    /// Fiber optic.
    Fo,
}

impl NetworkMedia {
    pub fn as_str(self) -> &'static str {
        match self {
            NetworkMedia::Vsat => "VSAT",
            NetworkMedia::M2m => "M2M",
            NetworkMedia::Fo => "FO",
        }
    }
}

impl fmt::Display for NetworkMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkMedia {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VSAT" => Ok(NetworkMedia::Vsat),
            "M2M" => Ok(NetworkMedia::M2m),
            "FO" => Ok(NetworkMedia::Fo),
            other => Err(StateError::UnknownMedia(other.to_string())),
        }
    }
}

/// A monitored branch or ATM as described by the endpoint registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkEndpoint {
    pub id: EndpointId,
    pub endpoint_type: EndpointType,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    pub ip_address: String,
    #[serde(default)]
    pub backup_ip_address: Option<String>,
    #[serde(default)]
    pub network_media: Option<NetworkMedia>,
    #[serde(default)]
    pub network_vendor: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Parent branch of an ATM.
    #[serde(default)]
    pub branch_id: Option<EndpointId>,
}

impl NetworkEndpoint {
    /// Minimal branch endpoint; remaining metadata is left empty.
    pub fn branch(id: &str, code: &str, ip_address: &str) -> Self {
        Self::new(id, EndpointType::Branch, code, ip_address)
    }

    /// Minimal ATM endpoint; remaining metadata is left empty.
    pub fn atm(id: &str, code: &str, ip_address: &str) -> Self {
        Self::new(id, EndpointType::Atm, code, ip_address)
    }

    fn new(id: &str, endpoint_type: EndpointType, code: &str, ip_address: &str) -> Self {
        Self {
            id: id.to_string(),
            endpoint_type,
            code: code.to_string(),
            name: code.to_string(),
            location: None,
            ip_address: ip_address.to_string(),
            backup_ip_address: None,
            network_media: None,
            network_vendor: None,
            latitude: None,
            longitude: None,
            branch_id: None,
        }
    }

    pub fn with_backup_ip(mut self, ip_address: &str) -> Self {
        self.backup_ip_address = Some(ip_address.to_string());
        self
    }

    pub fn with_media(mut self, media: NetworkMedia) -> Self {
        self.network_media = Some(media);
        self
    }

    pub fn with_parent_branch(mut self, branch_id: &str) -> Self {
        self.branch_id = Some(branch_id.to_string());
        self
    }
}

// ── Status ─────────────────────────────────────────────────────────

/// Connectivity status of an endpoint.
///
/// `Unverified` is the placeholder before the first probe completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndpointStatus {
    Online,
    Slow,
    Offline,
    Timeout,
    Error,
    #[default]
    Unverified,
}

impl EndpointStatus {
    /// Member of the down set {OFFLINE, TIMEOUT, ERROR}.
    pub fn is_down(self) -> bool {
        matches!(
            self,
            EndpointStatus::Offline | EndpointStatus::Timeout | EndpointStatus::Error
        )
    }

    /// Reachable (ONLINE or SLOW).
    pub fn is_up(self) -> bool {
        matches!(self, EndpointStatus::Online | EndpointStatus::Slow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointStatus::Online => "ONLINE",
            EndpointStatus::Slow => "SLOW",
            EndpointStatus::Offline => "OFFLINE",
            EndpointStatus::Timeout => "TIMEOUT",
            EndpointStatus::Error => "ERROR",
            EndpointStatus::Unverified => "UNVERIFIED",
        }
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointStatus {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ONLINE" => Ok(EndpointStatus::Online),
            "SLOW" => Ok(EndpointStatus::Slow),
            "OFFLINE" => Ok(EndpointStatus::Offline),
            "TIMEOUT" => Ok(EndpointStatus::Timeout),
            "ERROR" => Ok(EndpointStatus::Error),
            "UNVERIFIED" => Ok(EndpointStatus::Unverified),
            other => Err(StateError::UnknownStatus(other.to_string())),
        }
    }
}

/// Which configured address a probe went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IpRole {
    Primary,
    Backup,
}

/// Outcome of one completed probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthCheckResult {
    pub endpoint_id: EndpointId,
    pub status: EndpointStatus,
    pub response_time_ms: Option<u64>,
    /// Packet loss in percent (0–100).
    pub packet_loss: Option<f64>,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub ip_address: String,
    pub ip_role: IpRole,
}

// ── Runtime state ──────────────────────────────────────────────────

/// One contiguous period spent in a single status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusPeriod {
    pub status: EndpointStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u64>,
}

/// Ping-derived state of an endpoint. Written only by the status resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndpointRuntimeState {
    pub status: EndpointStatus,
    pub previous_status: Option<EndpointStatus>,
    pub status_changed_at: Option<DateTime<Utc>>,
    /// Set only while `status` is in the down set.
    pub down_since: Option<DateTime<Utc>>,
    pub current_downtime_seconds: u64,
    /// Completed down intervals, folded in on recovery.
    pub total_downtime_seconds: u64,
    /// ONLINE observations over all observations, in percent.
    pub uptime_percentage: f64,
    pub observations: u64,
    pub online_observations: u64,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_response_time_ms: Option<u64>,
    pub last_packet_loss: Option<f64>,
    pub last_error_message: Option<String>,
    pub last_ip_address: Option<String>,
    pub last_ip_role: Option<IpRole>,
    pub history: Vec<StatusPeriod>,
}

impl EndpointRuntimeState {
    /// Rebuild the last observation as a `HealthCheckResult`.
    ///
    /// Returns `None` before the first probe completed.
    pub fn last_result(&self, endpoint: &NetworkEndpoint) -> Option<HealthCheckResult> {
        let checked_at = self.last_checked_at?;
        Some(HealthCheckResult {
            endpoint_id: endpoint.id.clone(),
            status: self.status,
            response_time_ms: self.last_response_time_ms,
            packet_loss: self.last_packet_loss,
            error_message: self.last_error_message.clone(),
            checked_at,
            ip_address: self
                .last_ip_address
                .clone()
                .unwrap_or_else(|| endpoint.ip_address.clone()),
            ip_role: self.last_ip_role.unwrap_or(IpRole::Primary),
        })
    }
}

// ── Alarms ─────────────────────────────────────────────────────────

/// Hardware alarm status of an endpoint, independent of reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmStatus {
    #[default]
    Online,
    Alarm,
}

/// One active alarm reported by the alarm feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlarmSignal {
    pub device_code: String,
    pub alarm_type: String,
    pub location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AlarmSignal {
    /// Human-readable age of the alarm ("45s ago", "3m ago", "2d ago").
    pub fn time_ago(&self, now: DateTime<Utc>) -> String {
        let seconds = (now - self.occurred_at).num_seconds().max(0);
        if seconds < 60 {
            format!("{seconds}s ago")
        } else if seconds < 3600 {
            format!("{}m ago", seconds / 60)
        } else if seconds < 86_400 {
            format!("{}h ago", seconds / 3600)
        } else {
            format!("{}d ago", seconds / 86_400)
        }
    }
}

/// Alarm-derived state of an endpoint. Written only by the alarm correlator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AlarmState {
    pub alarm_status: AlarmStatus,
    pub current_alarms: Vec<AlarmSignal>,
    pub last_alarm_update: Option<DateTime<Utc>>,
}

// ── Record ─────────────────────────────────────────────────────────

/// Everything the store knows about one endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointRecord {
    pub endpoint_id: EndpointId,
    pub endpoint_type: EndpointType,
    pub code: String,
    pub branch_id: Option<EndpointId>,
    pub ping: EndpointRuntimeState,
    pub alarm: AlarmState,
}

impl EndpointRecord {
    /// Placeholder record for an endpoint that has not been probed yet.
    pub fn placeholder(endpoint: &NetworkEndpoint) -> Self {
        Self {
            endpoint_id: endpoint.id.clone(),
            endpoint_type: endpoint.endpoint_type,
            code: endpoint.code.clone(),
            branch_id: endpoint.branch_id.clone(),
            ping: EndpointRuntimeState::default(),
            alarm: AlarmState::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn down_set_membership() {
        assert!(EndpointStatus::Offline.is_down());
        assert!(EndpointStatus::Timeout.is_down());
        assert!(EndpointStatus::Error.is_down());
        assert!(!EndpointStatus::Online.is_down());
        assert!(!EndpointStatus::Slow.is_down());
        assert!(!EndpointStatus::Unverified.is_down());
        assert!(!EndpointStatus::Unverified.is_up());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("online".parse::<EndpointStatus>(), Ok(EndpointStatus::Online));
        assert_eq!(" TIMEOUT ".parse::<EndpointStatus>(), Ok(EndpointStatus::Timeout));
        assert_eq!(
            "WARNING".parse::<EndpointStatus>(),
            Err(StateError::UnknownStatus("WARNING".to_string()))
        );
    }

    #[test]
    fn status_serializes_screaming_case() {
        let json = serde_json::to_string(&EndpointStatus::Unverified).unwrap();
        assert_eq!(json, "\"UNVERIFIED\"");
        let media: NetworkMedia = serde_json::from_str("\"M2M\"").unwrap();
        assert_eq!(media, NetworkMedia::M2m);
    }

    #[test]
    fn endpoint_deserializes_with_sparse_metadata() {
        let json = r#"{
            "id": "atm-1",
            "endpoint_type": "ATM",
            "code": "0126",
            "name": "ATM 0126",
            "ip_address": "10.1.2.3"
        }"#;
        let endpoint: NetworkEndpoint = serde_json::from_str(json).unwrap();
        assert_eq!(endpoint.endpoint_type, EndpointType::Atm);
        assert!(endpoint.backup_ip_address.is_none());
        assert!(endpoint.network_media.is_none());
    }

    #[test]
    fn placeholder_record_is_unverified() {
        let endpoint = NetworkEndpoint::atm("atm-1", "0126", "10.0.0.1").with_parent_branch("br-1");
        let record = EndpointRecord::placeholder(&endpoint);
        assert_eq!(record.ping.status, EndpointStatus::Unverified);
        assert!(record.ping.down_since.is_none());
        assert_eq!(record.alarm.alarm_status, AlarmStatus::Online);
        assert_eq!(record.branch_id.as_deref(), Some("br-1"));
    }

    #[test]
    fn last_result_requires_an_observation() {
        let endpoint = NetworkEndpoint::branch("br-1", "001", "10.0.0.1");
        let mut state = EndpointRuntimeState::default();
        assert!(state.last_result(&endpoint).is_none());

        state.status = EndpointStatus::Offline;
        state.last_checked_at = Some(Utc::now());
        state.last_error_message = Some("Host unreachable".to_string());
        let result = state.last_result(&endpoint).unwrap();
        assert_eq!(result.status, EndpointStatus::Offline);
        assert_eq!(result.ip_address, "10.0.0.1");
        assert_eq!(result.ip_role, IpRole::Primary);
    }

    #[test]
    fn alarm_time_ago_buckets() {
        let now = Utc::now();
        let mut alarm = AlarmSignal {
            device_code: "0126".to_string(),
            alarm_type: "Cash Low".to_string(),
            location: None,
            occurred_at: now - Duration::seconds(45),
        };
        assert_eq!(alarm.time_ago(now), "45s ago");

        alarm.occurred_at = now - Duration::minutes(3);
        assert_eq!(alarm.time_ago(now), "3m ago");

        alarm.occurred_at = now - Duration::hours(5);
        assert_eq!(alarm.time_ago(now), "5h ago");

        alarm.occurred_at = now - Duration::days(2);
        assert_eq!(alarm.time_ago(now), "2d ago");
    }
}
