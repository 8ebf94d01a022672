//! Configuration file management.
//!
//! The file is TOML with a `[scanner]` table of tunables, a `[radio]` table
//! of BLE timeouts, and any number of `[[roster]]` known devices:
//!
//! ```toml
//! [scanner]
//! report_interval_ms = 1000
//! penalty_floor = -100.0
//!
//! [[roster]]
//! user_id = 42
//! identity_key = "0f8fad5b-d9cb-469f-a165-70867728950e"
//! name = "Ada"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nearby_core::{BtleOptions, ProximityConfig, ScannerConfig};
use nearby_types::{KnownDevice, TierThresholds};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Coordinator tunables.
    pub scanner: ScannerSection,
    /// BLE operation timeouts.
    pub radio: RadioSection,
    /// Devices whose identity is already known.
    pub roster: Vec<KnownDevice>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Every interval and timeout is non-zero
    /// - The sample window holds between 1 and 100 samples
    /// - The penalty floor is negative
    /// - Thresholds satisfy far < near < immediate < 0
    /// - Roster identity keys are UUIDs and not repeated
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.scanner.validate());
        errors.extend(self.radio.validate());

        let mut seen = HashSet::new();
        for (i, device) in self.roster.iter().enumerate() {
            let prefix = format!("roster[{}]", i);
            match device.identity_uuid() {
                Ok(uuid) => {
                    if !seen.insert(uuid) {
                        errors.push(ValidationError {
                            field: format!("{}.identity_key", prefix),
                            message: format!("duplicate identity key '{}'", device.identity_key),
                        });
                    }
                }
                Err(e) => errors.push(ValidationError {
                    field: format!("{}.identity_key", prefix),
                    message: e.to_string(),
                }),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Coordinator settings derived from the `[scanner]` table.
    pub fn scanner_config(&self) -> ScannerConfig {
        let s = &self.scanner;
        let proximity = ProximityConfig::new()
            .penalty_floor(s.penalty_floor)
            .staleness_timeout(Duration::from_millis(s.staleness_timeout_ms))
            .max_samples(s.max_samples)
            .thresholds(TierThresholds {
                immediate: s.immediate_threshold,
                near: s.near_threshold,
                far: s.far_threshold,
            });
        ScannerConfig::new()
            .proximity(proximity)
            .report_interval(Duration::from_millis(s.report_interval_ms))
            .connect_poll_interval(Duration::from_millis(s.connect_poll_interval_ms))
            .rescan_interval(Duration::from_millis(s.rescan_interval_ms))
    }

    /// Radio timeouts derived from the `[radio]` table.
    pub fn btle_options(&self) -> BtleOptions {
        BtleOptions {
            connect_timeout: Duration::from_millis(self.radio.connect_timeout_ms),
            discovery_timeout: Duration::from_millis(self.radio.discovery_timeout_ms),
            read_timeout: Duration::from_millis(self.radio.read_timeout_ms),
        }
    }
}

/// Coordinator tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerSection {
    /// Report cycle period.
    pub report_interval_ms: u64,
    /// Connect cycle period while nothing is pending.
    pub connect_poll_interval_ms: u64,
    /// Deadline for outstanding connects.
    pub rescan_interval_ms: u64,
    /// Silence before an identified device earns penalty samples.
    pub staleness_timeout_ms: u64,
    /// Score appended for a silent device.
    pub penalty_floor: f32,
    /// Rolling sample window size.
    pub max_samples: usize,
    /// Lower bound of the Immediate band.
    pub immediate_threshold: f32,
    /// Lower bound of the Near band.
    pub near_threshold: f32,
    /// Lower bound of the Far band.
    pub far_threshold: f32,
}

impl Default for ScannerSection {
    fn default() -> Self {
        let defaults = ScannerConfig::default();
        let proximity = defaults.proximity;
        Self {
            report_interval_ms: defaults.report_interval.as_millis() as u64,
            connect_poll_interval_ms: defaults.connect_poll_interval.as_millis() as u64,
            rescan_interval_ms: defaults.rescan_interval.as_millis() as u64,
            staleness_timeout_ms: proximity.staleness_timeout.as_millis() as u64,
            penalty_floor: proximity.penalty_floor,
            max_samples: proximity.max_samples,
            immediate_threshold: proximity.thresholds.immediate,
            near_threshold: proximity.thresholds.near,
            far_threshold: proximity.thresholds.far,
        }
    }
}

impl ScannerSection {
    /// Validate scanner configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (name, value) in [
            ("report_interval_ms", self.report_interval_ms),
            ("connect_poll_interval_ms", self.connect_poll_interval_ms),
            ("rescan_interval_ms", self.rescan_interval_ms),
            ("staleness_timeout_ms", self.staleness_timeout_ms),
        ] {
            if value == 0 {
                errors.push(ValidationError {
                    field: format!("scanner.{}", name),
                    message: "must be greater than 0".to_string(),
                });
            }
        }

        if self.max_samples == 0 || self.max_samples > 100 {
            errors.push(ValidationError {
                field: "scanner.max_samples".to_string(),
                message: format!("must be between 1 and 100 (got {})", self.max_samples),
            });
        }

        if !self.penalty_floor.is_finite() || self.penalty_floor >= 0.0 {
            errors.push(ValidationError {
                field: "scanner.penalty_floor".to_string(),
                message: format!("must be negative (got {})", self.penalty_floor),
            });
        }

        let thresholds = TierThresholds {
            immediate: self.immediate_threshold,
            near: self.near_threshold,
            far: self.far_threshold,
        };
        if !thresholds.is_ordered() {
            errors.push(ValidationError {
                field: "scanner.immediate_threshold".to_string(),
                message: format!(
                    "thresholds must satisfy far < near < immediate < 0 (got {} / {} / {})",
                    self.far_threshold, self.near_threshold, self.immediate_threshold
                ),
            });
        }

        errors
    }
}

/// BLE timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSection {
    /// Connect attempt timeout.
    pub connect_timeout_ms: u64,
    /// GATT service discovery timeout.
    pub discovery_timeout_ms: u64,
    /// Identity read timeout.
    pub read_timeout_ms: u64,
}

impl Default for RadioSection {
    fn default() -> Self {
        let defaults = BtleOptions::default();
        Self {
            connect_timeout_ms: defaults.connect_timeout.as_millis() as u64,
            discovery_timeout_ms: defaults.discovery_timeout.as_millis() as u64,
            read_timeout_ms: defaults.read_timeout.as_millis() as u64,
        }
    }
}

impl RadioSection {
    /// Validate radio configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("discovery_timeout_ms", self.discovery_timeout_ms),
            ("read_timeout_ms", self.read_timeout_ms),
        ]
        .into_iter()
        .filter(|(_, value)| *value == 0)
        .map(|(name, _)| ValidationError {
            field: format!("radio.{}", name),
            message: "must be greater than 0".to_string(),
        })
        .collect()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `scanner.max_samples` or `roster[0].identity_key`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nearby")
        .join("config.toml")
}
