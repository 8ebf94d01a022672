//! Core types for proximity detection.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ParseError, ParseResult};

/// Opaque identifier of a radio-layer peripheral.
///
/// On macOS this is the CoreBluetooth UUID string, on Linux/Windows the MAC
/// address. The record only holds it while a connection may be needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TransportId(String);

impl TransportId {
    /// Create a transport id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransportId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TransportId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Where a device is in the discover → connect → identify lifecycle.
///
/// Transitions only move forward: `AwaitingData → Connecting → Identified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LifecycleState {
    /// Seen by discovery, identity not yet requested.
    #[default]
    AwaitingData,
    /// Selected for an identity read; a connect is outstanding or failed.
    Connecting,
    /// A non-zero user id has been assigned.
    Identified,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::AwaitingData => write!(f, "awaiting data"),
            LifecycleState::Connecting => write!(f, "connecting"),
            LifecycleState::Identified => write!(f, "identified"),
        }
    }
}

/// Coarse distance classification derived from the smoothed RSSI score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProximityTier {
    /// Within arm's reach.
    Immediate,
    /// Same room.
    Near,
    /// Weak but still heard.
    Far,
    /// No usable signal, or a score outside every band.
    #[default]
    Unknown,
}

impl ProximityTier {
    /// Whether this tier is reported to the application.
    #[must_use]
    pub fn is_immediate(self) -> bool {
        self == ProximityTier::Immediate
    }
}

impl fmt::Display for ProximityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProximityTier::Immediate => write!(f, "Immediate"),
            ProximityTier::Near => write!(f, "Near"),
            ProximityTier::Far => write!(f, "Far"),
            ProximityTier::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Score bands used to map a proximity score to a [`ProximityTier`].
///
/// Bands are half-open and inclusive of their lower bound:
///
/// | Score | Tier |
/// |-------|------|
/// | `< far` | Unknown |
/// | `[far, near)` | Far |
/// | `[near, immediate)` | Near |
/// | `[immediate, 0)` | Immediate |
/// | `>= 0` | Unknown |
///
/// ```
/// use nearby_types::{ProximityTier, TierThresholds};
///
/// let thresholds = TierThresholds::default();
/// assert_eq!(thresholds.classify(-72.0), ProximityTier::Immediate);
/// assert_eq!(thresholds.classify(-90.0), ProximityTier::Near);
/// assert_eq!(thresholds.classify(0.0), ProximityTier::Unknown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TierThresholds {
    /// Lower bound of the Immediate band.
    pub immediate: f32,
    /// Lower bound of the Near band.
    pub near: f32,
    /// Lower bound of the Far band.
    pub far: f32,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            immediate: -72.0,
            near: -90.0,
            far: -200.0,
        }
    }
}

impl TierThresholds {
    /// Classify a proximity score.
    #[must_use]
    pub fn classify(&self, score: f32) -> ProximityTier {
        if score < self.far {
            ProximityTier::Unknown
        } else if score < self.near {
            ProximityTier::Far
        } else if score < self.immediate {
            ProximityTier::Near
        } else if score < 0.0 {
            ProximityTier::Immediate
        } else {
            ProximityTier::Unknown
        }
    }

    /// Check that the bands are strictly ordered and negative.
    pub fn is_ordered(&self) -> bool {
        self.far < self.near && self.near < self.immediate && self.immediate < 0.0
    }
}

/// The application-level handshake read from a connected device.
///
/// The wire format is UTF-8 text with exactly two comma-separated fields:
/// an integer user id followed by the display name.
///
/// ```
/// use nearby_types::IdentityPayload;
///
/// let payload = IdentityPayload::parse(b"42,Ada Lovelace").unwrap();
/// assert_eq!(payload.user_id, 42);
/// assert_eq!(payload.user_name, "Ada Lovelace");
///
/// assert!(IdentityPayload::parse(b"42").is_err());
/// assert!(IdentityPayload::parse(b"x,Ada").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdentityPayload {
    /// Application user id. Zero means "unknown".
    pub user_id: i64,
    /// Display name, possibly empty.
    pub user_name: String,
}

impl IdentityPayload {
    /// Parse an identity payload from raw characteristic bytes.
    pub fn parse(data: &[u8]) -> ParseResult<Self> {
        let text = core::str::from_utf8(data).map_err(|_| ParseError::InvalidUtf8)?;
        text.parse()
    }
}

impl FromStr for IdentityPayload {
    type Err = ParseError;

    fn from_str(s: &str) -> ParseResult<Self> {
        let fields: Vec<&str> = s.split(',').collect();
        let [id, name] = fields.as_slice() else {
            return Err(ParseError::FieldCount(fields.len()));
        };
        let user_id = id
            .parse::<i64>()
            .map_err(|_| ParseError::InvalidUserId((*id).to_string()))?;
        Ok(Self {
            user_id,
            user_name: (*name).to_string(),
        })
    }
}

/// A roster entry for a device whose identity is already known.
///
/// Pre-seeded devices skip the connect/identify handshake entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KnownDevice {
    /// Application user id.
    pub user_id: i64,
    /// Identity key as a UUID string.
    pub identity_key: String,
    /// Optional display name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
}

impl KnownDevice {
    /// Create a new roster entry.
    pub fn new(user_id: i64, identity_key: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            user_id,
            identity_key: identity_key.into(),
            name: name.map(str::to_string),
        }
    }

    /// Parse the identity key as a UUID.
    pub fn identity_uuid(&self) -> ParseResult<Uuid> {
        Uuid::parse_str(self.identity_key.trim())
            .map_err(|_| ParseError::InvalidIdentityKey(self.identity_key.clone()))
    }
}

/// Read-only snapshot of a device handed to the application.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceView {
    /// Stable identity key.
    pub identity: Uuid,
    /// Application user id (0 if unknown).
    pub user_id: i64,
    /// Display name.
    pub user_name: String,
    /// Tier computed on the last report tick.
    pub tier: ProximityTier,
    /// Score computed on the last report tick.
    pub score: f32,
    /// Number of samples currently held.
    pub samples: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        let t = TierThresholds::default();
        assert_eq!(t.classify(-200.1), ProximityTier::Unknown);
        assert_eq!(t.classify(-200.0), ProximityTier::Far);
        assert_eq!(t.classify(-90.1), ProximityTier::Far);
        assert_eq!(t.classify(-90.0), ProximityTier::Near);
        assert_eq!(t.classify(-72.1), ProximityTier::Near);
        assert_eq!(t.classify(-72.0), ProximityTier::Immediate);
        assert_eq!(t.classify(-0.1), ProximityTier::Immediate);
        assert_eq!(t.classify(0.0), ProximityTier::Unknown);
        assert_eq!(t.classify(12.0), ProximityTier::Unknown);
    }

    #[test]
    fn test_thresholds_ordering() {
        assert!(TierThresholds::default().is_ordered());
        let swapped = TierThresholds {
            immediate: -90.0,
            near: -72.0,
            far: -200.0,
        };
        assert!(!swapped.is_ordered());
    }

    #[test]
    fn test_identity_payload_parse() {
        let p = IdentityPayload::parse(b"7,Grace").unwrap();
        assert_eq!(p.user_id, 7);
        assert_eq!(p.user_name, "Grace");

        let p = IdentityPayload::parse(b"-3,").unwrap();
        assert_eq!(p.user_id, -3);
        assert_eq!(p.user_name, "");
    }

    #[test]
    fn test_identity_payload_rejects_malformed() {
        assert_eq!(
            IdentityPayload::parse(b"12"),
            Err(ParseError::FieldCount(1))
        );
        assert_eq!(
            IdentityPayload::parse(b"12,Ada,extra"),
            Err(ParseError::FieldCount(3))
        );
        assert_eq!(
            IdentityPayload::parse(b" 12,Ada"),
            Err(ParseError::InvalidUserId(" 12".to_string()))
        );
        assert_eq!(
            IdentityPayload::parse(&[0xff, 0xfe, b',', b'a']),
            Err(ParseError::InvalidUtf8)
        );
    }

    #[test]
    fn test_known_device_identity() {
        let known = KnownDevice::new(5, "0f8fad5b-d9cb-469f-a165-70867728950e", Some("Bob"));
        assert!(known.identity_uuid().is_ok());

        let bad = KnownDevice::new(5, "not-a-uuid", None);
        assert!(matches!(
            bad.identity_uuid(),
            Err(ParseError::InvalidIdentityKey(_))
        ));
    }

    #[test]
    fn test_transport_id_display() {
        let id = TransportId::from("AA:BB:CC:DD:EE:FF");
        assert_eq!(id.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(id.as_str(), "AA:BB:CC:DD:EE:FF");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_tier_serde() {
        let json = serde_json::to_string(&ProximityTier::Immediate).unwrap();
        assert_eq!(json, "\"immediate\"");
        let back: ProximityTier = serde_json::from_str("\"far\"").unwrap();
        assert_eq!(back, ProximityTier::Far);
    }
}
