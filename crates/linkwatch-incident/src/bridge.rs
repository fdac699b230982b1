//! Incident bridge — single and bulk ticket creation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use linkwatch_state::{
    EndpointId, EndpointRuntimeState, EndpointStatus, EndpointType, HealthCheckResult,
    NetworkEndpoint, SnapshotStore,
};

use crate::error::{IncidentError, IncidentResult};
use crate::report::{build_description, service_name, ticket_title, IncidentType};
use crate::service::{IncidentTicketRequest, TicketRef, TicketingService};

/// Pause between consecutive requests of a bulk sweep.
pub const DEFAULT_PACING: Duration = Duration::from_millis(200);

/// How long a ticketed outage is left alone by later bulk sweeps.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedTicket {
    pub endpoint_id: EndpointId,
    pub ticket: TicketRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketFailure {
    pub endpoint_id: EndpointId,
    pub error: String,
}

/// Result of `create_tickets_for_unhealthy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BulkTicketOutcome {
    /// No endpoint in the down set; no request was made.
    NothingToDo,
    Completed {
        success_count: usize,
        failure_count: usize,
        /// ATMs skipped because their parent branch is down.
        suppressed_count: usize,
        /// Endpoints skipped because their outage already has a ticket.
        deduplicated_count: usize,
        tickets: Vec<CreatedTicket>,
        failures: Vec<TicketFailure>,
    },
}

/// Ticket already opened for an ongoing outage.
#[derive(Debug, Clone)]
struct OpenIncident {
    ticket: TicketRef,
    /// `down_since` of the outage the ticket was opened for.
    down_since: Option<DateTime<Utc>>,
    opened_at: Instant,
}

/// Requests incident tickets from the helpdesk.
///
/// Tickets opened during this session are remembered per endpoint, so a
/// bulk sweep does not ticket the same outage twice within the dedup
/// window. An endpoint that recovers (or whose outage restarts) is
/// ticketed again.
pub struct IncidentBridge {
    ticketing: Arc<dyn TicketingService>,
    store: SnapshotStore,
    pacing: Duration,
    suppress_child_atms: bool,
    dedup_window: Duration,
    open_incidents: Mutex<HashMap<EndpointId, OpenIncident>>,
}

impl IncidentBridge {
    pub fn new(ticketing: Arc<dyn TicketingService>, store: SnapshotStore) -> Self {
        Self {
            ticketing,
            store,
            pacing: DEFAULT_PACING,
            suppress_child_atms: false,
            dedup_window: DEFAULT_DEDUP_WINDOW,
            open_incidents: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Skip ATMs whose parent branch is down in bulk sweeps.
    pub fn with_child_suppression(mut self, enabled: bool) -> Self {
        self.suppress_child_atms = enabled;
        self
    }

    /// Zero disables deduplication.
    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Ticket opened for the endpoint's current outage, if any.
    pub fn open_ticket(&self, endpoint_id: &str) -> Option<TicketRef> {
        self.open_incidents
            .lock()
            .get(endpoint_id)
            .map(|incident| incident.ticket.clone())
    }

    /// Request one ticket for `endpoint` using `result` as the evidence.
    ///
    /// One request, no retry. Fails with `NotUnhealthy` when the result
    /// describes a healthy or unverified endpoint.
    pub async fn create_ticket(
        &self,
        endpoint: &NetworkEndpoint,
        result: &HealthCheckResult,
    ) -> IncidentResult<TicketRef> {
        let incident =
            IncidentType::from_status(result.status).ok_or_else(|| IncidentError::NotUnhealthy {
                endpoint_id: endpoint.id.clone(),
                status: result.status,
            })?;

        let state = self.store.get(&endpoint.id).map(|r| r.ping);
        let request = self.build_request(endpoint, result, state.as_ref(), incident);

        let ticket = self.ticketing.create_incident_ticket(&request).await?;
        self.open_incidents.lock().insert(
            endpoint.id.clone(),
            OpenIncident {
                ticket: ticket.clone(),
                down_since: state.and_then(|s| s.down_since),
                opened_at: Instant::now(),
            },
        );
        info!(
            endpoint_id = %endpoint.id,
            code = %endpoint.code,
            %incident,
            ticket_id = %ticket.ticket_id,
            "incident ticket created"
        );
        Ok(ticket)
    }

    /// Request a ticket from the endpoint's last stored observation.
    pub async fn create_ticket_from_store(
        &self,
        endpoint: &NetworkEndpoint,
    ) -> IncidentResult<TicketRef> {
        let record = self
            .store
            .get(&endpoint.id)
            .ok_or_else(|| IncidentError::EndpointNotFound(endpoint.id.clone()))?;
        let result = record
            .ping
            .last_result(endpoint)
            .ok_or_else(|| IncidentError::NotUnhealthy {
                endpoint_id: endpoint.id.clone(),
                status: EndpointStatus::Unverified,
            })?;
        self.create_ticket(endpoint, &result).await
    }

    /// Ticket every endpoint whose stored status is in the down set.
    ///
    /// Requests are sequential with the pacing delay between consecutive
    /// requests. Failures are counted and the sweep continues. Endpoints
    /// whose outage was ticketed within the dedup window are skipped.
    pub async fn create_tickets_for_unhealthy(
        &self,
        endpoints: &[NetworkEndpoint],
    ) -> BulkTicketOutcome {
        let snapshot = self.store.snapshot();
        let is_down = |id: &str| snapshot.get(id).is_some_and(|r| r.ping.status.is_down());

        // Recovered, restarted and expired outages free their slot.
        let now = Instant::now();
        self.open_incidents.lock().retain(|id, incident| {
            let same_outage = snapshot.get(id).is_some_and(|r| {
                r.ping.status.is_down() && r.ping.down_since == incident.down_since
            });
            same_outage && now.duration_since(incident.opened_at) < self.dedup_window
        });

        let unhealthy: Vec<&NetworkEndpoint> =
            endpoints.iter().filter(|e| is_down(&e.id)).collect();
        if unhealthy.is_empty() {
            debug!(endpoints = endpoints.len(), "no unhealthy endpoints, nothing to ticket");
            return BulkTicketOutcome::NothingToDo;
        }

        let (targets, suppressed): (Vec<&NetworkEndpoint>, Vec<&NetworkEndpoint>) =
            unhealthy.into_iter().partition(|endpoint| {
                !(self.suppress_child_atms
                    && endpoint.endpoint_type == EndpointType::Atm
                    && endpoint.branch_id.as_deref().is_some_and(is_down))
            });
        for endpoint in &suppressed {
            debug!(endpoint_id = %endpoint.id, branch_id = ?endpoint.branch_id, "ATM suppressed, parent branch down");
        }

        let (targets, deduplicated) = {
            let open = self.open_incidents.lock();
            let split: (Vec<&NetworkEndpoint>, Vec<&NetworkEndpoint>) =
                targets.into_iter().partition(|endpoint| {
                    let Some(incident) = open.get(&endpoint.id) else {
                        return true;
                    };
                    debug!(
                        endpoint_id = %endpoint.id,
                        ticket_id = %incident.ticket.ticket_id,
                        "outage already ticketed"
                    );
                    false
                });
            split
        };

        info!(
            targets = targets.len(),
            suppressed = suppressed.len(),
            deduplicated = deduplicated.len(),
            "bulk incident ticket sweep started"
        );

        let mut tickets = Vec::new();
        let mut failures = Vec::new();
        for (i, endpoint) in targets.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing).await;
            }

            let outcome = match snapshot.get(&endpoint.id).and_then(|r| r.ping.last_result(endpoint)) {
                Some(result) => self.create_ticket(endpoint, &result).await,
                None => Err(IncidentError::EndpointNotFound(endpoint.id.clone())),
            };
            match outcome {
                Ok(ticket) => tickets.push(CreatedTicket {
                    endpoint_id: endpoint.id.clone(),
                    ticket,
                }),
                Err(e) => {
                    warn!(endpoint_id = %endpoint.id, error = %e, "incident ticket failed");
                    failures.push(TicketFailure {
                        endpoint_id: endpoint.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            success = tickets.len(),
            failed = failures.len(),
            suppressed = suppressed.len(),
            deduplicated = deduplicated.len(),
            "bulk incident ticket sweep finished"
        );
        BulkTicketOutcome::Completed {
            success_count: tickets.len(),
            failure_count: failures.len(),
            suppressed_count: suppressed.len(),
            deduplicated_count: deduplicated.len(),
            tickets,
            failures,
        }
    }

    fn build_request(
        &self,
        endpoint: &NetworkEndpoint,
        result: &HealthCheckResult,
        state: Option<&EndpointRuntimeState>,
        incident: IncidentType,
    ) -> IncidentTicketRequest {
        let branch_id = match endpoint.endpoint_type {
            EndpointType::Branch => Some(endpoint.id.clone()),
            EndpointType::Atm => endpoint.branch_id.clone(),
        };
        IncidentTicketRequest {
            endpoint_id: endpoint.id.clone(),
            endpoint_type: endpoint.endpoint_type,
            code: endpoint.code.clone(),
            incident_type: incident,
            priority: incident.priority(),
            service_name: service_name(incident, endpoint.endpoint_type, endpoint.network_media)
                .to_string(),
            title: ticket_title(endpoint, incident),
            description: build_description(endpoint, result, state, incident, Utc::now()),
            network_media: endpoint.network_media,
            branch_id,
            ping_result: result.clone(),
        }
    }
}
