//! linkwatch-scheduler — the round-robin probe loop.
//!
//! Walks the endpoint list one endpoint at a time, probing each through the
//! `Prober` and writing the result through the `StatusResolver`. Exactly one
//! probe is in flight per scheduler.
//!
//! # Architecture
//!
//! ```text
//! ProbeScheduler
//!   ├── session task (tokio::spawn, CancellationToken)
//!   │   ├── RoundRobinCursor (clamp → probe → advance, wrap = +1 cycle)
//!   │   ├── skip-offline: OFFLINE endpoints passed with a 100 ms grace
//!   │   └── pacing: ProbeDelay between probes
//!   ├── settings (watch channel, live updates)
//!   └── skip signal (Notify) abandons the current probe or wait
//! ```

pub mod cursor;
pub mod error;
pub mod scheduler;

pub use cursor::RoundRobinCursor;
pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{ProbeScheduler, SchedulerSettings, SchedulerStatus, SKIP_GRACE};
