//! linkwatch.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::duration::parse_duration;
use crate::error::ConfigError;
use crate::types::{MediaProfile, ProbeDelay, ProbeProfiles};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkwatchConfig {
    pub scheduler: Option<SchedulerConfig>,
    pub probe: Option<ProbeConfig>,
    pub alarms: Option<AlarmsConfig>,
    pub incident: Option<IncidentConfig>,
    pub dashboard: Option<DashboardConfig>,
    pub collaborators: Option<CollaboratorsConfig>,
    pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// "fast", "normal", "slow", "very_slow" or one of 1000/2000/3000/5000.
    pub delay: Option<String>,
    pub skip_offline: Option<bool>,
    /// Start probing as soon as the daemon is up.
    pub autostart: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub slow_packet_loss: Option<f64>,
    pub vsat: Option<MediaProfileConfig>,
    pub m2m: Option<MediaProfileConfig>,
    pub fo: Option<MediaProfileConfig>,
    pub default: Option<MediaProfileConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaProfileConfig {
    pub timeout: Option<String>,
    pub slow_threshold_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlarmsConfig {
    pub refresh_interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentConfig {
    /// Pause between two ticket requests of a bulk sweep.
    pub pacing: Option<String>,
    pub suppress_child_atms: Option<bool>,
    /// A down endpoint ticketed within this window is not ticketed again
    /// by a bulk sweep. "0s" turns deduplication off.
    pub dedup_window: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub refresh_interval: Option<String>,
}

/// Base URLs of the external services the engine talks to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollaboratorsConfig {
    pub registry_url: Option<String>,
    /// Local inventory file used instead of a registry service.
    pub inventory_path: Option<String>,
    pub probe_url: Option<String>,
    pub alarm_url: Option<String>,
    pub ticketing_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: Option<u16>,
}

pub const DEFAULT_ALARM_REFRESH: Duration = Duration::from_secs(30);
pub const DEFAULT_DASHBOARD_REFRESH: Duration = Duration::from_secs(30);
pub const DEFAULT_TICKET_PACING: Duration = Duration::from_millis(200);
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_API_PORT: u16 = 8480;

impl LinkwatchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LinkwatchConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a linkwatch.toml with every default spelled out.
    pub fn scaffold() -> Self {
        LinkwatchConfig {
            scheduler: Some(SchedulerConfig {
                delay: Some("normal".to_string()),
                skip_offline: Some(false),
                autostart: Some(false),
            }),
            probe: Some(ProbeConfig {
                slow_packet_loss: Some(10.0),
                ..ProbeConfig::default()
            }),
            alarms: Some(AlarmsConfig {
                refresh_interval: Some("30s".to_string()),
            }),
            incident: Some(IncidentConfig {
                pacing: Some("200ms".to_string()),
                suppress_child_atms: Some(false),
                dedup_window: Some("30m".to_string()),
            }),
            dashboard: Some(DashboardConfig {
                refresh_interval: Some("30s".to_string()),
            }),
            collaborators: Some(CollaboratorsConfig {
                registry_url: None,
                inventory_path: Some("inventory.json".to_string()),
                probe_url: Some("http://127.0.0.1:9100".to_string()),
                alarm_url: None,
                ticketing_url: None,
            }),
            api: Some(ApiConfig {
                port: Some(DEFAULT_API_PORT),
            }),
        }
    }

    pub fn probe_delay(&self) -> Result<ProbeDelay, ConfigError> {
        match self.scheduler.as_ref().and_then(|s| s.delay.as_deref()) {
            Some(raw) => raw.parse(),
            None => Ok(ProbeDelay::default()),
        }
    }

    pub fn skip_offline(&self) -> bool {
        self.scheduler
            .as_ref()
            .and_then(|s| s.skip_offline)
            .unwrap_or(false)
    }

    pub fn autostart(&self) -> bool {
        self.scheduler
            .as_ref()
            .and_then(|s| s.autostart)
            .unwrap_or(false)
    }

    pub fn alarm_refresh_interval(&self) -> Result<Duration, ConfigError> {
        resolve_duration(
            "alarms.refresh_interval",
            self.alarms.as_ref().and_then(|a| a.refresh_interval.as_deref()),
            DEFAULT_ALARM_REFRESH,
        )
    }

    pub fn dashboard_refresh_interval(&self) -> Result<Duration, ConfigError> {
        resolve_duration(
            "dashboard.refresh_interval",
            self.dashboard
                .as_ref()
                .and_then(|d| d.refresh_interval.as_deref()),
            DEFAULT_DASHBOARD_REFRESH,
        )
    }

    pub fn ticket_pacing(&self) -> Result<Duration, ConfigError> {
        resolve_duration(
            "incident.pacing",
            self.incident.as_ref().and_then(|i| i.pacing.as_deref()),
            DEFAULT_TICKET_PACING,
        )
    }

    pub fn incident_dedup_window(&self) -> Result<Duration, ConfigError> {
        resolve_duration(
            "incident.dedup_window",
            self.incident.as_ref().and_then(|i| i.dedup_window.as_deref()),
            DEFAULT_DEDUP_WINDOW,
        )
    }

    pub fn suppress_child_atms(&self) -> bool {
        self.incident
            .as_ref()
            .and_then(|i| i.suppress_child_atms)
            .unwrap_or(false)
    }

    pub fn api_port(&self) -> u16 {
        self.api
            .as_ref()
            .and_then(|a| a.port)
            .unwrap_or(DEFAULT_API_PORT)
    }

    /// Resolve per-media probe profiles, falling back to built-in defaults.
    pub fn probe_profiles(&self) -> Result<ProbeProfiles, ConfigError> {
        let mut profiles = ProbeProfiles::default();
        let Some(probe) = self.probe.as_ref() else {
            return Ok(profiles);
        };

        if let Some(loss) = probe.slow_packet_loss {
            if !(0.0..=100.0).contains(&loss) {
                return Err(ConfigError::InvalidValue {
                    field: "probe.slow_packet_loss",
                    reason: format!("{loss} is not a percentage"),
                });
            }
            profiles.slow_packet_loss = loss;
        }

        apply_profile("probe.vsat.timeout", &mut profiles.vsat, probe.vsat.as_ref())?;
        apply_profile("probe.m2m.timeout", &mut profiles.m2m, probe.m2m.as_ref())?;
        apply_profile("probe.fo.timeout", &mut profiles.fo, probe.fo.as_ref())?;
        apply_profile(
            "probe.default.timeout",
            &mut profiles.default,
            probe.default.as_ref(),
        )?;
        Ok(profiles)
    }
}

fn apply_profile(
    field: &'static str,
    target: &mut MediaProfile,
    overrides: Option<&MediaProfileConfig>,
) -> Result<(), ConfigError> {
    let Some(overrides) = overrides else {
        return Ok(());
    };
    target.timeout = resolve_duration(field, overrides.timeout.as_deref(), target.timeout)?;
    if let Some(threshold) = overrides.slow_threshold_ms {
        target.slow_threshold_ms = threshold;
    }
    Ok(())
}

fn resolve_duration(
    field: &'static str,
    raw: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match raw {
        Some(value) => parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
        }),
        None => Ok(default),
    }
}
