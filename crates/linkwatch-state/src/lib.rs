//! linkwatch-state — domain types and the endpoint snapshot store.
//!
//! The `SnapshotStore` keeps the last-known record of every monitored
//! endpoint for the lifetime of one monitoring session. It is created at
//! session start, handed to every component by handle, and dropped with the
//! session. Nothing in linkwatch reaches it through global state.
//!
//! # Architecture
//!
//! ```text
//! SnapshotStore (Arc<RwLock<HashMap<id, EndpointRecord>>>)
//!   ├── ping fields   ← StatusResolver (linkwatch-health)
//!   ├── alarm fields  ← AlarmCorrelator (linkwatch-alarms)
//!   └── revision watch → listeners recompute FleetStats
//! ```
//!
//! Writers own disjoint halves of each record, so a probe result and an
//! alarm merge never contend on the same field.

pub mod error;
pub mod registry;
pub mod store;
pub mod types;

pub use error::{RegistryError, StateError, StateResult};
pub use registry::{EndpointFilter, EndpointRegistry, InMemoryRegistry};
pub use store::SnapshotStore;
pub use types::*;
