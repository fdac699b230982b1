//! Alarm feed contract and boundary normalization.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use linkwatch_state::AlarmSignal;

use crate::error::AlarmFeedError;

/// Alarm entry as delivered by the feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAlarm {
    #[serde(default)]
    pub device_code: String,
    #[serde(default)]
    pub alarm_type: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Source of currently active hardware alarms.
#[async_trait]
pub trait AlarmFeed: Send + Sync {
    async fn list_current_alarms(&self) -> Result<Vec<RawAlarm>, AlarmFeedError>;
}

/// Validate raw feed entries.
///
/// Entries without a device code cannot be matched to anything and are
/// dropped. A missing timestamp is taken as `now`.
pub fn normalize_alarms(raw: Vec<RawAlarm>, now: DateTime<Utc>) -> Vec<AlarmSignal> {
    raw.into_iter()
        .filter_map(|alarm| {
            let device_code = alarm.device_code.trim();
            if device_code.is_empty() {
                warn!(alarm_type = %alarm.alarm_type, "alarm without device code dropped");
                return None;
            }
            let alarm_type = match alarm.alarm_type.trim() {
                "" => "Unknown".to_string(),
                kind => kind.to_string(),
            };
            Some(AlarmSignal {
                device_code: device_code.to_string(),
                alarm_type,
                location: alarm.location.filter(|l| !l.trim().is_empty()),
                occurred_at: alarm.occurred_at.unwrap_or(now),
            })
        })
        .collect()
}
