//! Ticketing service contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use linkwatch_state::{EndpointId, EndpointType, HealthCheckResult, NetworkMedia};

use crate::error::TicketingError;
use crate::report::{IncidentType, TicketPriority};

/// Everything the helpdesk needs to open an incident ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentTicketRequest {
    pub endpoint_id: EndpointId,
    pub endpoint_type: EndpointType,
    pub code: String,
    pub incident_type: IncidentType,
    pub priority: TicketPriority,
    /// Helpdesk service the ticket is routed to.
    pub service_name: String,
    pub title: String,
    pub description: String,
    pub network_media: Option<NetworkMedia>,
    /// Branch the ticket is filed under (the ATM's parent for ATMs).
    pub branch_id: Option<EndpointId>,
    pub ping_result: HealthCheckResult,
}

/// Reference to a ticket created by the helpdesk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRef {
    pub ticket_id: String,
    #[serde(default)]
    pub ticket_number: Option<String>,
}

/// External helpdesk that persists tickets.
#[async_trait]
pub trait TicketingService: Send + Sync {
    async fn create_incident_ticket(
        &self,
        request: &IncidentTicketRequest,
    ) -> Result<TicketRef, TicketingError>;
}
