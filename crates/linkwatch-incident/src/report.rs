//! Incident classification and report text.

use std::fmt;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use linkwatch_state::{
    EndpointRuntimeState, EndpointStatus, EndpointType, HealthCheckResult, IpRole,
    NetworkEndpoint, NetworkMedia,
};

/// Kind of network incident a ticket reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentType {
    Outage,
    Slow,
    Timeout,
    Error,
}

impl IncidentType {
    /// Incident for a status, `None` for healthy or unverified endpoints.
    pub fn from_status(status: EndpointStatus) -> Option<Self> {
        match status {
            EndpointStatus::Offline => Some(IncidentType::Outage),
            EndpointStatus::Slow => Some(IncidentType::Slow),
            EndpointStatus::Timeout => Some(IncidentType::Timeout),
            EndpointStatus::Error => Some(IncidentType::Error),
            EndpointStatus::Online | EndpointStatus::Unverified => None,
        }
    }

    pub fn priority(self) -> TicketPriority {
        match self {
            IncidentType::Outage => TicketPriority::High,
            _ => TicketPriority::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentType::Outage => "OUTAGE",
            IncidentType::Slow => "SLOW",
            IncidentType::Timeout => "TIMEOUT",
            IncidentType::Error => "ERROR",
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Medium,
    High,
}

/// Helpdesk service an incident is routed to.
///
/// Branch outages go to the team owning the link's media; ATM outages
/// always go to transaction processing.
pub fn service_name(
    incident: IncidentType,
    endpoint_type: EndpointType,
    media: Option<NetworkMedia>,
) -> &'static str {
    match incident {
        IncidentType::Outage => match (endpoint_type, media) {
            (EndpointType::Atm, _) => "ATM Network Outage - Transaction Processing Failure",
            (EndpointType::Branch, Some(NetworkMedia::Vsat)) => "VSAT Satellite Network Issues",
            (EndpointType::Branch, Some(NetworkMedia::M2m)) => "M2M Cellular Network Issues",
            (EndpointType::Branch, Some(NetworkMedia::Fo)) => "Fiber Optic Network Issues",
            (EndpointType::Branch, None) => "Critical Network Outage - Branch Complete Failure",
        },
        IncidentType::Slow => "Severe Network Performance Degradation",
        IncidentType::Timeout | IncidentType::Error => "Intermittent Network Connectivity Issues",
    }
}

/// `[AUTO] ATM Network OUTAGE - 0126`
pub fn ticket_title(endpoint: &NetworkEndpoint, incident: IncidentType) -> String {
    format!(
        "[AUTO] {} Network {} - {}",
        endpoint.endpoint_type, incident, endpoint.code
    )
}

/// Human-readable duration: "45 seconds", "3 minutes 20 seconds",
/// "2 hours 5 minutes", "1 days 4 hours".
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{seconds} seconds")
    } else if seconds < 3600 {
        format!("{} minutes {} seconds", seconds / 60, seconds % 60)
    } else if seconds < 86_400 {
        format!("{} hours {} minutes", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{} days {} hours", seconds / 86_400, (seconds % 86_400) / 3600)
    }
}

/// Plain-text incident report for the ticket body.
///
/// `state` is the endpoint's stored runtime state, when there is one; it
/// supplies previous status, downtime and uptime.
pub fn build_description(
    endpoint: &NetworkEndpoint,
    result: &HealthCheckResult,
    state: Option<&EndpointRuntimeState>,
    incident: IncidentType,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let unknown = "Unknown";

    // Writing into a String cannot fail.
    let _ = writeln!(out, "AUTOMATED NETWORK INCIDENT REPORT");
    let _ = writeln!(out);
    let _ = writeln!(out, "Location: {} ({})", endpoint.name, endpoint.code);
    if let Some(location) = endpoint.location.as_deref() {
        let _ = writeln!(out, "Address: {location}");
    }
    let _ = writeln!(out, "Type: {}", endpoint.endpoint_type);
    let _ = writeln!(out, "IP Address: {}", result.ip_address);
    let _ = writeln!(
        out,
        "Network Media: {}",
        endpoint.network_media.map(|m| m.as_str()).unwrap_or(unknown)
    );
    let _ = writeln!(
        out,
        "Vendor: {}",
        endpoint.network_vendor.as_deref().unwrap_or(unknown)
    );
    let _ = writeln!(out, "Detected At: {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out);

    let _ = writeln!(out, "Incident Details:");
    let _ = writeln!(out, "- Incident Type: {incident}");
    let _ = writeln!(out, "- Current Status: {}", result.status);
    if let Some(previous) = state
        .and_then(|s| s.previous_status)
        .filter(|p| *p != result.status)
    {
        let _ = writeln!(out, "- Previous Status: {previous}");
    }
    if let Some(ms) = result.response_time_ms {
        let _ = writeln!(out, "- Response Time: {ms}ms");
    }
    if let Some(loss) = result.packet_loss.filter(|l| *l > 0.0) {
        let _ = writeln!(out, "- Packet Loss: {loss:.1}%");
    }
    if let Some(error) = result.error_message.as_deref() {
        let _ = writeln!(out, "- Error Message: {error}");
    }
    if let Some(state) = state {
        if let Some(since) = state.down_since.filter(|_| result.status.is_down()) {
            let downtime = (now - since).num_seconds().max(0) as u64;
            let _ = writeln!(out, "- Downtime Duration: {}", format_duration(downtime));
            let _ = writeln!(out, "- Down Since: {}", since.format("%Y-%m-%d %H:%M UTC"));
        }
        if let Some(changed) = state.status_changed_at {
            let ago = (now - changed).num_seconds().max(0) as u64;
            let _ = writeln!(out, "- Status Changed: {} ago", format_duration(ago));
        }
        if state.observations > 0 {
            let _ = writeln!(
                out,
                "- Uptime: {:.1}% over {} checks",
                state.uptime_percentage, state.observations
            );
        }
        if state.total_downtime_seconds > 0 {
            let _ = writeln!(
                out,
                "- Earlier Downtime: {}",
                format_duration(state.total_downtime_seconds)
            );
        }
    }
    if result.ip_role == IpRole::Backup {
        let _ = writeln!(out, "- Reached via backup address");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Business Impact:");
    for line in business_impact(endpoint.endpoint_type, incident) {
        let _ = writeln!(out, "- {line}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Recommended Actions:");
    let _ = writeln!(out, "1. Verify physical network connections");
    let _ = writeln!(
        out,
        "2. Check with network vendor ({})",
        endpoint.network_vendor.as_deref().unwrap_or("vendor")
    );
    let _ = writeln!(out, "3. Review network equipment status");
    let _ = writeln!(out, "4. Monitor for service restoration");
    let _ = writeln!(out);
    let _ = write!(
        out,
        "This ticket was generated automatically by network monitoring."
    );
    out
}

fn business_impact(endpoint_type: EndpointType, incident: IncidentType) -> &'static [&'static str] {
    match (endpoint_type, incident) {
        (EndpointType::Branch, IncidentType::Outage) => &[
            "Branch operations severely impacted",
            "Staff unable to access core banking systems",
            "Customer service disrupted",
        ],
        (EndpointType::Branch, IncidentType::Slow) => &[
            "Degraded performance affecting productivity",
            "Delays in customer transactions",
        ],
        (EndpointType::Branch, _) => &[
            "Intermittent connectivity issues",
            "Potential service interruptions",
        ],
        (EndpointType::Atm, IncidentType::Outage) => &[
            "ATM out of service",
            "Customers unable to perform transactions",
        ],
        (EndpointType::Atm, IncidentType::Slow) => &[
            "Slow transaction processing",
            "Extended transaction times",
        ],
        (EndpointType::Atm, _) => &[
            "Intermittent transaction failures",
            "Customer experience degraded",
        ],
    }
}
