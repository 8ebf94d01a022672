//! Tunable constants for the proximity engine and scan coordinator.
//!
//! Every constant the signal pipeline depends on lives here so front ends can
//! load them from a file instead of recompiling.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use nearby_core::{ProximityConfig, ScannerConfig};
//!
//! let config = ScannerConfig::new()
//!     .report_interval(Duration::from_millis(500))
//!     .proximity(ProximityConfig::new().penalty_floor(-110.0));
//!
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use uuid::Uuid;

use nearby_types::TierThresholds;
use nearby_types::uuid::{IDENTITY_CHARACTERISTIC, PROXIMITY_SERVICE};

use crate::error::{Error, Result};

/// Default number of samples kept per device.
pub const DEFAULT_MAX_SAMPLES: usize = 10;

/// Default score injected for a silent device.
pub const DEFAULT_PENALTY_FLOOR: f32 = -100.0;

/// Per-device signal processing settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityConfig {
    /// Synthetic sample appended when an identified device goes quiet.
    /// Any stored sample at or below this value is purged by the next real one.
    pub penalty_floor: f32,
    /// Silence longer than this earns a penalty sample on each report tick.
    pub staleness_timeout: Duration,
    /// Size of the rolling sample window.
    pub max_samples: usize,
    /// Fixed divisor applied to the summed score.
    pub score_divisor: f32,
    /// Score bands.
    pub thresholds: TierThresholds,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            penalty_floor: DEFAULT_PENALTY_FLOOR,
            staleness_timeout: Duration::from_secs(3),
            max_samples: DEFAULT_MAX_SAMPLES,
            score_divisor: DEFAULT_MAX_SAMPLES as f32,
            thresholds: TierThresholds::default(),
        }
    }
}

impl ProximityConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the penalty floor.
    #[must_use]
    pub fn penalty_floor(mut self, floor: f32) -> Self {
        self.penalty_floor = floor;
        self
    }

    /// Set the staleness timeout.
    #[must_use]
    pub fn staleness_timeout(mut self, timeout: Duration) -> Self {
        self.staleness_timeout = timeout;
        self
    }

    /// Set the sample window size.
    #[must_use]
    pub fn max_samples(mut self, max: usize) -> Self {
        self.max_samples = max;
        self
    }

    /// Set the score bands.
    #[must_use]
    pub fn thresholds(mut self, thresholds: TierThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_samples == 0 {
            return Err(Error::invalid_config("max_samples must be at least 1"));
        }
        if !(self.score_divisor > 0.0) {
            return Err(Error::invalid_config("score_divisor must be positive"));
        }
        if !self.penalty_floor.is_finite() || self.penalty_floor >= 0.0 {
            return Err(Error::invalid_config(format!(
                "penalty_floor {} must be a negative finite score",
                self.penalty_floor
            )));
        }
        if !self.thresholds.is_ordered() {
            return Err(Error::invalid_config(format!(
                "thresholds must satisfy far < near < immediate < 0 (got {:?})",
                self.thresholds
            )));
        }
        Ok(())
    }
}

/// Settings for the scan coordinator's cycles and radio usage.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerConfig {
    /// Per-device signal processing.
    pub proximity: ProximityConfig,
    /// Period of the report cycle.
    pub report_interval: Duration,
    /// Period of the connect cycle while nothing is pending.
    pub connect_poll_interval: Duration,
    /// Deadline after which outstanding connects are abandoned and scanning resumes.
    pub rescan_interval: Duration,
    /// Service advertised by participating devices.
    pub service_uuid: Uuid,
    /// Characteristic carrying the identity payload.
    pub identity_characteristic: Uuid,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            proximity: ProximityConfig::default(),
            report_interval: Duration::from_secs(1),
            connect_poll_interval: Duration::from_secs(5),
            rescan_interval: Duration::from_secs(10),
            service_uuid: PROXIMITY_SERVICE,
            identity_characteristic: IDENTITY_CHARACTERISTIC,
            event_capacity: 100,
        }
    }
}

impl ScannerConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-device settings.
    #[must_use]
    pub fn proximity(mut self, proximity: ProximityConfig) -> Self {
        self.proximity = proximity;
        self
    }

    /// Set the report interval.
    #[must_use]
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Set the connect-poll interval.
    #[must_use]
    pub fn connect_poll_interval(mut self, interval: Duration) -> Self {
        self.connect_poll_interval = interval;
        self
    }

    /// Set the rescan deadline.
    #[must_use]
    pub fn rescan_interval(mut self, interval: Duration) -> Self {
        self.rescan_interval = interval;
        self
    }

    /// Set the advertised service to scan for.
    #[must_use]
    pub fn service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuid = uuid;
        self
    }

    /// Set the identity characteristic.
    #[must_use]
    pub fn identity_characteristic(mut self, uuid: Uuid) -> Self {
        self.identity_characteristic = uuid;
        self
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<()> {
        self.proximity.validate()?;
        for (name, value) in [
            ("report_interval", self.report_interval),
            ("connect_poll_interval", self.connect_poll_interval),
            ("rescan_interval", self.rescan_interval),
        ] {
            if value.is_zero() {
                return Err(Error::invalid_config(format!("{} must be non-zero", name)));
            }
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("event_capacity must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.proximity.max_samples, 10);
        assert_eq!(config.proximity.penalty_floor, -100.0);
        assert_eq!(config.proximity.staleness_timeout, Duration::from_secs(3));
        assert_eq!(config.proximity.thresholds, TierThresholds::default());
        assert_eq!(config.report_interval, Duration::from_secs(1));
        assert_eq!(config.connect_poll_interval, Duration::from_secs(5));
        assert_eq!(config.rescan_interval, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ScannerConfig::new()
            .report_interval(Duration::from_millis(250))
            .rescan_interval(Duration::from_secs(4))
            .proximity(ProximityConfig::new().max_samples(5));
        assert_eq!(config.report_interval, Duration::from_millis(250));
        assert_eq!(config.rescan_interval, Duration::from_secs(4));
        assert_eq!(config.proximity.max_samples, 5);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = ScannerConfig::new().connect_poll_interval(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("connect_poll_interval"));
    }

    #[test]
    fn test_validate_rejects_bad_proximity() {
        assert!(ProximityConfig::new().max_samples(0).validate().is_err());
        assert!(ProximityConfig::new().penalty_floor(5.0).validate().is_err());
        assert!(ProximityConfig::new().penalty_floor(f32::NAN).validate().is_err());
        let swapped = TierThresholds {
            immediate: -95.0,
            near: -90.0,
            far: -200.0,
        };
        assert!(ProximityConfig::new().thresholds(swapped).validate().is_err());
    }
}
