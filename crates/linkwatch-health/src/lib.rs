//! linkwatch-health — probing and status tracking for monitored endpoints.
//!
//! The `Prober` asks an external `ProbeTransport` whether an address is
//! reachable, normalizes whatever comes back into a strict
//! `HealthCheckResult`, and guarantees that at most one probe is in flight.
//! The `StatusResolver` folds each result into the endpoint's runtime state.
//!
//! # Architecture
//!
//! ```text
//! Prober
//!   ├── single-slot CancellationToken (new probe cancels the previous)
//!   ├── ProbeTransport::check(ip) → RawProbeReport | TransportError
//!   ├── per-media timeout + slow thresholds (ProbeProfiles)
//!   └── backup address fallback when the primary is down
//!        ↓ ProbeOutcome::Completed(HealthCheckResult)
//! StatusResolver
//!   ├── previous/current status, status_changed_at
//!   ├── down_since, current/total downtime
//!   ├── uptime counter ratio
//!   └── bounded status history → SnapshotStore ping fields
//! ```
//!
//! # Failure handling
//!
//! Transport failures never escape the prober. A timeout becomes `TIMEOUT`,
//! anything else becomes `ERROR` with the transport's message attached. A
//! cancelled probe yields `ProbeOutcome::Cancelled` and must not be written.

pub mod prober;
pub mod resolver;

pub use prober::{ProbeOutcome, ProbeTransport, Prober, RawProbeReport, TransportError};
pub use resolver::{StatusResolver, StatusTransition};
