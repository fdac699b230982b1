//! Shared types used across linkwatch crates.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pause between two consecutive probes of the round-robin scheduler.
///
/// Only the four presets are recognized; arbitrary millisecond values are
/// rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeDelay {
    /// 1000 ms.
    Fast,
    /// 2000 ms.
    #[default]
    Normal,
    /// 3000 ms.
    Slow,
    /// 5000 ms.
    VerySlow,
}

impl ProbeDelay {
    pub const ALL: [ProbeDelay; 4] = [
        ProbeDelay::Fast,
        ProbeDelay::Normal,
        ProbeDelay::Slow,
        ProbeDelay::VerySlow,
    ];

    pub fn as_millis(self) -> u64 {
        match self {
            ProbeDelay::Fast => 1000,
            ProbeDelay::Normal => 2000,
            ProbeDelay::Slow => 3000,
            ProbeDelay::VerySlow => 5000,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::from_millis(self.as_millis())
    }

    /// Display label used by operator surfaces.
    pub fn label(self) -> &'static str {
        match self {
            ProbeDelay::Fast => "Fast",
            ProbeDelay::Normal => "Normal",
            ProbeDelay::Slow => "Slow",
            ProbeDelay::VerySlow => "Very Slow",
        }
    }
}

impl TryFrom<u64> for ProbeDelay {
    type Error = ConfigError;

    fn try_from(millis: u64) -> Result<Self, Self::Error> {
        ProbeDelay::ALL
            .into_iter()
            .find(|d| d.as_millis() == millis)
            .ok_or_else(|| ConfigError::UnsupportedDelay(millis.to_string()))
    }
}

impl FromStr for ProbeDelay {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "fast" => Ok(ProbeDelay::Fast),
            "normal" => Ok(ProbeDelay::Normal),
            "slow" => Ok(ProbeDelay::Slow),
            "very_slow" | "veryslow" => Ok(ProbeDelay::VerySlow),
            other => match other.trim_end_matches("ms").parse::<u64>() {
                Ok(millis) => ProbeDelay::try_from(millis),
                Err(_) => Err(ConfigError::UnsupportedDelay(s.to_string())),
            },
        }
    }
}

impl fmt::Display for ProbeDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} ms)", self.label(), self.as_millis())
    }
}

/// Timeout and slowness threshold for one kind of network link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaProfile {
    /// Upper bound for one probe round trip.
    pub timeout: Duration,
    /// A reachable endpoint answering slower than this is `SLOW`.
    pub slow_threshold_ms: u64,
}

/// Per-network-media probe profiles.
///
/// Satellite links are expected to be slower than fiber, so each media type
/// gets its own timeout and slowness threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeProfiles {
    pub vsat: MediaProfile,
    pub m2m: MediaProfile,
    pub fo: MediaProfile,
    pub default: MediaProfile,
    /// Packet loss (percent) above which a reachable endpoint is `SLOW`.
    pub slow_packet_loss: f64,
}

impl Default for ProbeProfiles {
    fn default() -> Self {
        Self {
            vsat: MediaProfile {
                timeout: Duration::from_secs(5),
                slow_threshold_ms: 1000,
            },
            m2m: MediaProfile {
                timeout: Duration::from_secs(3),
                slow_threshold_ms: 600,
            },
            fo: MediaProfile {
                timeout: Duration::from_secs(2),
                slow_threshold_ms: 200,
            },
            default: MediaProfile {
                timeout: Duration::from_secs(3),
                slow_threshold_ms: 800,
            },
            slow_packet_loss: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_presets_map_to_millis() {
        assert_eq!(ProbeDelay::Fast.as_millis(), 1000);
        assert_eq!(ProbeDelay::Normal.as_millis(), 2000);
        assert_eq!(ProbeDelay::Slow.as_millis(), 3000);
        assert_eq!(ProbeDelay::VerySlow.as_millis(), 5000);
        assert_eq!(ProbeDelay::default(), ProbeDelay::Normal);
    }

    #[test]
    fn delay_from_millis_rejects_unknown_values() {
        assert_eq!(ProbeDelay::try_from(3000), Ok(ProbeDelay::Slow));
        assert!(matches!(
            ProbeDelay::try_from(1500),
            Err(ConfigError::UnsupportedDelay(_))
        ));
    }

    #[test]
    fn delay_parses_names_and_millis() {
        assert_eq!("fast".parse::<ProbeDelay>(), Ok(ProbeDelay::Fast));
        assert_eq!("Very Slow".parse::<ProbeDelay>(), Ok(ProbeDelay::VerySlow));
        assert_eq!("very-slow".parse::<ProbeDelay>(), Ok(ProbeDelay::VerySlow));
        assert_eq!("5000".parse::<ProbeDelay>(), Ok(ProbeDelay::VerySlow));
        assert_eq!("2000ms".parse::<ProbeDelay>(), Ok(ProbeDelay::Normal));
        assert!("turbo".parse::<ProbeDelay>().is_err());
        assert!("250".parse::<ProbeDelay>().is_err());
    }

    #[test]
    fn delay_serde_uses_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            delay: ProbeDelay,
        }
        let w: Wrapper = toml::from_str("delay = \"very_slow\"").unwrap();
        assert_eq!(w.delay, ProbeDelay::VerySlow);
    }

    #[test]
    fn satellite_profile_is_most_lenient() {
        let profiles = ProbeProfiles::default();
        assert!(profiles.vsat.timeout > profiles.fo.timeout);
        assert!(profiles.vsat.slow_threshold_ms > profiles.m2m.slow_threshold_ms);
        assert_eq!(profiles.slow_packet_loss, 10.0);
    }
}
