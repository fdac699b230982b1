//! Incident bridge error types.

use thiserror::Error;

use linkwatch_state::EndpointStatus;

/// Failures reported by the external ticketing service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketingError {
    #[error("ticketing service unavailable: {0}")]
    Unavailable(String),

    #[error("ticket rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed ticketing response: {0}")]
    Malformed(String),
}

/// Errors from requesting an incident ticket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncidentError {
    #[error(transparent)]
    Ticketing(#[from] TicketingError),

    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("endpoint {endpoint_id} is {status}, no incident to report")]
    NotUnhealthy {
        endpoint_id: String,
        status: EndpointStatus,
    },
}

pub type IncidentResult<T> = Result<T, IncidentError>;
