//! linkwatch-incident — turns unhealthy endpoints into incident tickets.
//!
//! The bridge classifies an endpoint's failure, routes it to a helpdesk
//! service, writes a plain-text incident report and submits the ticket
//! through an external `TicketingService`. Ticket storage is not ours.
//!
//! # Architecture
//!
//! ```text
//! IncidentBridge
//!   ├── create_ticket(endpoint, result)       single, errors surfaced
//!   └── create_tickets_for_unhealthy(list)    bulk sweep
//!         ├── filter: stored status in down set
//!         ├── optional: suppress ATMs behind a down branch
//!         ├── skip outages ticketed within the dedup window
//!         └── sequential requests, fixed pacing between them
//!
//! report
//!   ├── IncidentType / TicketPriority classification
//!   ├── service routing by endpoint type + network media
//!   └── incident report text
//! ```

pub mod bridge;
pub mod error;
pub mod report;
pub mod service;

pub use bridge::{
    BulkTicketOutcome, CreatedTicket, IncidentBridge, TicketFailure, DEFAULT_DEDUP_WINDOW,
    DEFAULT_PACING,
};
pub use error::{IncidentError, IncidentResult, TicketingError};
pub use report::{
    build_description, format_duration, service_name, ticket_title, IncidentType, TicketPriority,
};
pub use service::{IncidentTicketRequest, TicketRef, TicketingService};
