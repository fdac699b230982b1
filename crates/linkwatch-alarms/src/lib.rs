//! linkwatch-alarms — hardware alarm correlation.
//!
//! ATMs report hardware alarms (cash low, door open, printer fault...)
//! through a feed that knows nothing about network reachability. The
//! correlator matches feed entries to ATMs by device code and writes the
//! alarm half of each `EndpointRecord`. Ping fields are never touched.
//!
//! # Architecture
//!
//! ```text
//! AlarmCorrelator::run()  (own cadence, default 30s)
//!   ├── EndpointRegistry::list_endpoints()
//!   ├── AlarmFeed::list_current_alarms() → RawAlarm
//!   │     └── normalize_alarms(): trim codes, drop blank ones
//!   ├── merge_alarms() → id → AlarmState (branches always ONLINE)
//!   └── SnapshotStore::update_alarm()
//! ```
//!
//! A feed failure skips the merge for that cycle; the previous alarm state
//! stays in place and `last_alarm_update` stops advancing.

pub mod correlator;
pub mod error;
pub mod feed;

pub use correlator::{
    alarm_type_breakdown, merge_alarms, AlarmCorrelator, AlarmRefresh, AlarmTypeCount,
    DEFAULT_ALARM_INTERVAL,
};
pub use error::{AlarmFeedError, AlarmResult};
pub use feed::{normalize_alarms, AlarmFeed, RawAlarm};
