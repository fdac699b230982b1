//! linkwatch-metrics — fleet-wide statistics.
//!
//! Folds the snapshot store's records into `FleetStats` and renders them
//! in Prometheus text format.
//!
//! # Architecture
//!
//! ```text
//! SnapshotStore::snapshot()
//!   └── aggregate(records, cycle_count) → FleetStats
//!         ├── /api/v1/stats (JSON)
//!         └── render_prometheus() → text/plain for /metrics
//! ```

pub mod aggregator;
pub mod prometheus;

pub use aggregator::{aggregate, FleetStats};
pub use prometheus::render_prometheus;
