//! Probe execution and result normalization.
//!
//! Performs one reachability check per call through the configured
//! transport, applying the per-media timeout and the backup address
//! fallback. Starting a probe cancels whichever probe was still running.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use linkwatch_core::{MediaProfile, ProbeProfiles};
use linkwatch_state::{
    EndpointStatus, EndpointType, HealthCheckResult, IpRole, NetworkEndpoint, NetworkMedia,
};

/// Loosely-typed report as returned by the probe collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProbeReport {
    pub status: String,
    #[serde(default)]
    pub response_time_ms: Option<f64>,
    #[serde(default)]
    pub packet_loss: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RawProbeReport {
    pub fn online(response_time_ms: f64) -> Self {
        Self {
            status: "ONLINE".to_string(),
            response_time_ms: Some(response_time_ms),
            packet_loss: Some(0.0),
            error_message: None,
        }
    }

    pub fn offline(message: &str) -> Self {
        Self {
            status: "OFFLINE".to_string(),
            response_time_ms: None,
            packet_loss: Some(100.0),
            error_message: Some(message.to_string()),
        }
    }
}

/// Failures of the probe transport itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("probe timed out")]
    Timeout,

    #[error("connection refused: {0}")]
    Refused(String),

    #[error("malformed probe response: {0}")]
    Malformed(String),

    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("probe failed: {0}")]
    Other(String),
}

/// Reachability check against a single address (ICMP, TCP, remote agent...).
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn check(
        &self,
        ip_address: &str,
        endpoint_type: EndpointType,
    ) -> Result<RawProbeReport, TransportError>;
}

/// Result of `Prober::probe`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Completed(HealthCheckResult),
    /// Superseded by a newer probe or cancelled explicitly.
    Cancelled,
}

impl ProbeOutcome {
    pub fn into_result(self) -> Option<HealthCheckResult> {
        match self {
            ProbeOutcome::Completed(result) => Some(result),
            ProbeOutcome::Cancelled => None,
        }
    }
}

/// Single-flight prober.
pub struct Prober {
    transport: Arc<dyn ProbeTransport>,
    profiles: ProbeProfiles,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl Prober {
    pub fn new(transport: Arc<dyn ProbeTransport>, profiles: ProbeProfiles) -> Self {
        Self {
            transport,
            profiles,
            in_flight: Mutex::new(None),
        }
    }

    pub fn profiles(&self) -> &ProbeProfiles {
        &self.profiles
    }

    /// Probe an endpoint, cancelling any probe still in flight.
    pub async fn probe(&self, endpoint: &NetworkEndpoint) -> ProbeOutcome {
        let token = CancellationToken::new();
        if let Some(previous) = self.in_flight.lock().replace(token.clone()) {
            previous.cancel();
        }

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => ProbeOutcome::Cancelled,
            result = self.check_endpoint(endpoint) => ProbeOutcome::Completed(result),
        };

        if token.is_cancelled() {
            debug!(endpoint_id = %endpoint.id, "probe cancelled");
            return ProbeOutcome::Cancelled;
        }
        outcome
    }

    /// Cancel the probe currently in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.in_flight.lock().take() {
            token.cancel();
        }
    }

    async fn check_endpoint(&self, endpoint: &NetworkEndpoint) -> HealthCheckResult {
        let profile = self.profile_for(endpoint.network_media);
        let primary = self
            .check_address(endpoint, &endpoint.ip_address, IpRole::Primary, profile)
            .await;

        if !primary.status.is_down() {
            return primary;
        }

        let Some(backup_ip) = endpoint
            .backup_ip_address
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        else {
            return primary;
        };

        debug!(endpoint_id = %endpoint.id, %backup_ip, "primary down, trying backup address");
        let backup = self
            .check_address(endpoint, backup_ip, IpRole::Backup, profile)
            .await;
        if backup.status.is_up() {
            debug!(endpoint_id = %endpoint.id, %backup_ip, "endpoint reachable via backup address");
            backup
        } else {
            primary
        }
    }

    async fn check_address(
        &self,
        endpoint: &NetworkEndpoint,
        ip_address: &str,
        ip_role: IpRole,
        profile: MediaProfile,
    ) -> HealthCheckResult {
        let check = self.transport.check(ip_address, endpoint.endpoint_type);
        let (status, response_time_ms, packet_loss, error_message) =
            match tokio::time::timeout(profile.timeout, check).await {
                Ok(Ok(report)) => self.normalize(report, profile),
                Ok(Err(TransportError::Timeout)) => (
                    EndpointStatus::Timeout,
                    None,
                    None,
                    Some(TransportError::Timeout.to_string()),
                ),
                Ok(Err(e)) => (EndpointStatus::Error, None, None, Some(e.to_string())),
                Err(_) => (
                    EndpointStatus::Timeout,
                    None,
                    None,
                    Some(format!(
                        "no response within {} ms",
                        profile.timeout.as_millis()
                    )),
                ),
            };

        debug!(
            endpoint_id = %endpoint.id,
            %ip_address,
            ?ip_role,
            %status,
            ?response_time_ms,
            "probe completed"
        );

        HealthCheckResult {
            endpoint_id: endpoint.id.clone(),
            status,
            response_time_ms,
            packet_loss,
            error_message,
            checked_at: Utc::now(),
            ip_address: ip_address.to_string(),
            ip_role,
        }
    }

    /// Turn a raw report into a strict status plus measurements.
    fn normalize(
        &self,
        report: RawProbeReport,
        profile: MediaProfile,
    ) -> (EndpointStatus, Option<u64>, Option<f64>, Option<String>) {
        let response_time_ms = report
            .response_time_ms
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.round() as u64);
        let packet_loss = report
            .packet_loss
            .filter(|loss| loss.is_finite())
            .map(|loss| loss.clamp(0.0, 100.0));

        let mut error_message = report.error_message.filter(|m| !m.trim().is_empty());
        let status = match report.status.parse::<EndpointStatus>() {
            Ok(EndpointStatus::Unverified) | Err(_) => {
                error_message = Some(format!(
                    "unrecognized probe status '{}'",
                    report.status.trim()
                ));
                EndpointStatus::Error
            }
            Ok(EndpointStatus::Online) => {
                let slow_rtt = response_time_ms.is_some_and(|ms| ms > profile.slow_threshold_ms);
                let lossy = packet_loss.is_some_and(|loss| loss > self.profiles.slow_packet_loss);
                if slow_rtt || lossy {
                    EndpointStatus::Slow
                } else {
                    EndpointStatus::Online
                }
            }
            Ok(other) => other,
        };

        (status, response_time_ms, packet_loss, error_message)
    }

    fn profile_for(&self, media: Option<NetworkMedia>) -> MediaProfile {
        match media {
            Some(NetworkMedia::Vsat) => self.profiles.vsat,
            Some(NetworkMedia::M2m) => self.profiles.m2m,
            Some(NetworkMedia::Fo) => self.profiles.fo,
            None => self.profiles.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Scripted transport: per-address reply and latency.
    #[derive(Default)]
    struct FakeTransport {
        replies: HashMap<String, (Duration, Result<RawProbeReport, TransportError>)>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn reply(mut self, ip: &str, result: Result<RawProbeReport, TransportError>) -> Self {
            self.replies.insert(ip.to_string(), (Duration::ZERO, result));
            self
        }

        fn reply_after(
            mut self,
            ip: &str,
            delay: Duration,
            result: Result<RawProbeReport, TransportError>,
        ) -> Self {
            self.replies.insert(ip.to_string(), (delay, result));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl ProbeTransport for FakeTransport {
        async fn check(
            &self,
            ip_address: &str,
            _endpoint_type: EndpointType,
        ) -> Result<RawProbeReport, TransportError> {
            self.calls.lock().push(ip_address.to_string());
            let (delay, result) = self
                .replies
                .get(ip_address)
                .cloned()
                .unwrap_or((Duration::ZERO, Err(TransportError::Unreachable(ip_address.to_string()))));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }

    fn prober(transport: FakeTransport) -> (Arc<FakeTransport>, Prober) {
        let transport = Arc::new(transport);
        let prober = Prober::new(transport.clone(), ProbeProfiles::default());
        (transport, prober)
    }

    fn completed(outcome: ProbeOutcome) -> HealthCheckResult {
        outcome.into_result().expect("probe should complete")
    }

    #[tokio::test]
    async fn online_report_is_passed_through() {
        let (_, prober) = prober(FakeTransport::default().reply("10.0.0.1", Ok(RawProbeReport::online(42.0))));
        let endpoint = NetworkEndpoint::branch("br-1", "001", "10.0.0.1");

        let result = completed(prober.probe(&endpoint).await);
        assert_eq!(result.status, EndpointStatus::Online);
        assert_eq!(result.response_time_ms, Some(42));
        assert_eq!(result.ip_role, IpRole::Primary);
        assert_eq!(result.endpoint_id, "br-1");
    }

    #[tokio::test]
    async fn online_over_media_threshold_is_slow() {
        let (_, prober) = prober(
            FakeTransport::default()
                .reply("10.0.0.1", Ok(RawProbeReport::online(350.0)))
                .reply("10.0.0.2", Ok(RawProbeReport::online(350.0))),
        );
        let fiber = NetworkEndpoint::branch("br-1", "001", "10.0.0.1").with_media(NetworkMedia::Fo);
        let vsat = NetworkEndpoint::branch("br-2", "002", "10.0.0.2").with_media(NetworkMedia::Vsat);

        assert_eq!(completed(prober.probe(&fiber).await).status, EndpointStatus::Slow);
        assert_eq!(completed(prober.probe(&vsat).await).status, EndpointStatus::Online);
    }

    #[tokio::test]
    async fn packet_loss_above_limit_is_slow_and_clamped() {
        let report = RawProbeReport {
            status: "online".to_string(),
            response_time_ms: Some(-5.0),
            packet_loss: Some(140.0),
            error_message: None,
        };
        let (_, prober) = prober(FakeTransport::default().reply("10.0.0.1", Ok(report)));
        let endpoint = NetworkEndpoint::atm("atm-1", "0126", "10.0.0.1");

        let result = completed(prober.probe(&endpoint).await);
        assert_eq!(result.status, EndpointStatus::Slow);
        assert_eq!(result.packet_loss, Some(100.0));
        assert_eq!(result.response_time_ms, None);
    }

    #[tokio::test]
    async fn unknown_status_becomes_error() {
        let report = RawProbeReport {
            status: "DEGRADED".to_string(),
            ..RawProbeReport::default()
        };
        let (_, prober) = prober(FakeTransport::default().reply("10.0.0.1", Ok(report)));
        let endpoint = NetworkEndpoint::atm("atm-1", "0126", "10.0.0.1");

        let result = completed(prober.probe(&endpoint).await);
        assert_eq!(result.status, EndpointStatus::Error);
        assert!(result.error_message.unwrap().contains("DEGRADED"));
    }

    #[tokio::test]
    async fn transport_errors_are_absorbed() {
        let (_, prober) = prober(
            FakeTransport::default()
                .reply("10.0.0.1", Err(TransportError::Timeout))
                .reply("10.0.0.2", Err(TransportError::Refused("port 443".to_string()))),
        );
        let a = NetworkEndpoint::atm("atm-1", "0126", "10.0.0.1");
        let b = NetworkEndpoint::atm("atm-2", "0127", "10.0.0.2");

        assert_eq!(completed(prober.probe(&a).await).status, EndpointStatus::Timeout);
        let refused = completed(prober.probe(&b).await);
        assert_eq!(refused.status, EndpointStatus::Error);
        assert_eq!(refused.error_message.as_deref(), Some("connection refused: port 443"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_transport_hits_media_timeout() {
        let (_, prober) = prober(FakeTransport::default().reply_after(
            "10.0.0.1",
            Duration::from_secs(10),
            Ok(RawProbeReport::online(10.0)),
        ));
        let endpoint = NetworkEndpoint::branch("br-1", "001", "10.0.0.1").with_media(NetworkMedia::Fo);

        let started = tokio::time::Instant::now();
        let result = completed(prober.probe(&endpoint).await);
        assert_eq!(result.status, EndpointStatus::Timeout);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn backup_address_used_when_primary_down() {
        let (transport, prober) = prober(
            FakeTransport::default()
                .reply("10.0.0.1", Ok(RawProbeReport::offline("Request timed out")))
                .reply("10.9.0.1", Ok(RawProbeReport::online(80.0))),
        );
        let endpoint = NetworkEndpoint::branch("br-1", "001", "10.0.0.1").with_backup_ip("10.9.0.1");

        let result = completed(prober.probe(&endpoint).await);
        assert_eq!(result.status, EndpointStatus::Online);
        assert_eq!(result.ip_role, IpRole::Backup);
        assert_eq!(result.ip_address, "10.9.0.1");
        assert_eq!(transport.calls(), vec!["10.0.0.1", "10.9.0.1"]);
    }

    #[tokio::test]
    async fn primary_result_kept_when_backup_also_down() {
        let (_, prober) = prober(
            FakeTransport::default()
                .reply("10.0.0.1", Ok(RawProbeReport::offline("Request timed out")))
                .reply("10.9.0.1", Err(TransportError::Unreachable("no route".to_string()))),
        );
        let endpoint = NetworkEndpoint::branch("br-1", "001", "10.0.0.1").with_backup_ip("10.9.0.1");

        let result = completed(prober.probe(&endpoint).await);
        assert_eq!(result.status, EndpointStatus::Offline);
        assert_eq!(result.ip_role, IpRole::Primary);
        assert_eq!(result.error_message.as_deref(), Some("Request timed out"));
    }

    #[tokio::test]
    async fn backup_not_probed_when_primary_up() {
        let (transport, prober) = prober(
            FakeTransport::default().reply("10.0.0.1", Ok(RawProbeReport::online(5.0))),
        );
        let endpoint = NetworkEndpoint::branch("br-1", "001", "10.0.0.1").with_backup_ip("10.9.0.1");

        completed(prober.probe(&endpoint).await);
        assert_eq!(transport.calls(), vec!["10.0.0.1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn new_probe_cancels_the_one_in_flight() {
        let (_, prober) = prober(
            FakeTransport::default()
                .reply_after("10.0.0.1", Duration::from_millis(1500), Ok(RawProbeReport::online(5.0)))
                .reply("10.0.0.2", Ok(RawProbeReport::online(7.0))),
        );
        let prober = Arc::new(prober);
        let slow = NetworkEndpoint::branch("br-1", "001", "10.0.0.1");
        let fast = NetworkEndpoint::branch("br-2", "002", "10.0.0.2");

        let first = tokio::spawn({
            let prober = prober.clone();
            async move { prober.probe(&slow).await }
        });
        tokio::task::yield_now().await;

        let second = prober.probe(&fast).await;
        assert_eq!(completed(second).endpoint_id, "br-2");
        assert_eq!(first.await.unwrap(), ProbeOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_cancel_reports_cancelled() {
        let (_, prober) = prober(FakeTransport::default().reply_after(
            "10.0.0.1",
            Duration::from_millis(1500),
            Ok(RawProbeReport::online(5.0)),
        ));
        let prober = Arc::new(prober);
        let endpoint = NetworkEndpoint::branch("br-1", "001", "10.0.0.1");

        let probe = tokio::spawn({
            let prober = prober.clone();
            async move { prober.probe(&endpoint).await }
        });
        tokio::task::yield_now().await;
        prober.cancel();

        assert_eq!(probe.await.unwrap(), ProbeOutcome::Cancelled);
    }
}
