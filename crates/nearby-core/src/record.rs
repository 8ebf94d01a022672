//! Per-device state.

use std::collections::VecDeque;
use std::time::Instant;

use uuid::Uuid;

use nearby_types::{DeviceView, KnownDevice, LifecycleState, ProximityTier, TransportId};

/// Everything the coordinator knows about one device.
///
/// Records are created either by discovery (carrying a transport handle) or
/// from a [`KnownDevice`] roster entry (already identified, no handle).
/// All mutation goes through [`crate::ProximityEngine`].
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub(crate) transport_id: Option<TransportId>,
    pub(crate) identity: Uuid,
    pub(crate) user_id: i64,
    pub(crate) user_name: String,
    pub(crate) rssi_samples: VecDeque<f32>,
    pub(crate) last_sample_at: Instant,
    pub(crate) state: LifecycleState,
    pub(crate) tier: ProximityTier,
    pub(crate) score: f32,
}

impl DeviceRecord {
    /// Create a record for a peripheral reported by the radio layer.
    pub fn discovered(transport_id: TransportId, identity: Uuid, now: Instant) -> Self {
        Self {
            transport_id: Some(transport_id),
            identity,
            user_id: 0,
            user_name: String::new(),
            rssi_samples: VecDeque::new(),
            last_sample_at: now,
            state: LifecycleState::AwaitingData,
            tier: ProximityTier::Unknown,
            score: 0.0,
        }
    }

    /// Create a record from a roster entry.
    ///
    /// Returns `None` if the identity key is not a valid UUID. An entry with
    /// user id 0 is kept but stays unidentified.
    pub fn known(device: &KnownDevice, now: Instant) -> Option<Self> {
        let identity = device.identity_uuid().ok()?;
        let state = if device.user_id != 0 {
            LifecycleState::Identified
        } else {
            LifecycleState::AwaitingData
        };
        Some(Self {
            transport_id: None,
            identity,
            user_id: device.user_id,
            user_name: device.name.clone().unwrap_or_default(),
            rssi_samples: VecDeque::new(),
            last_sample_at: now,
            state,
            tier: ProximityTier::Unknown,
            score: 0.0,
        })
    }

    /// The live transport handle, if the record still needs one.
    pub fn transport_id(&self) -> Option<&TransportId> {
        self.transport_id.as_ref()
    }

    /// Stable identity key.
    pub fn identity(&self) -> Uuid {
        self.identity
    }

    /// Application user id (0 = unknown).
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Display name.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Retained samples, oldest first.
    pub fn samples(&self) -> impl ExactSizeIterator<Item = f32> + '_ {
        self.rssi_samples.iter().copied()
    }

    /// Number of retained samples.
    pub fn sample_count(&self) -> usize {
        self.rssi_samples.len()
    }

    /// When the last real sample was ingested. Penalty samples leave it untouched.
    pub fn last_sample_at(&self) -> Instant {
        self.last_sample_at
    }

    /// Lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Tier from the last recomputation.
    pub fn tier(&self) -> ProximityTier {
        self.tier
    }

    /// Score from the last recomputation.
    pub fn score(&self) -> f32 {
        self.score
    }

    /// A record counts as discovered once it holds at least one sample.
    pub fn is_discovered(&self) -> bool {
        !self.rssi_samples.is_empty()
    }

    /// Whether the identity handshake has completed.
    pub fn is_identified(&self) -> bool {
        self.state == LifecycleState::Identified
    }

    /// Snapshot for the application.
    pub fn view(&self) -> DeviceView {
        DeviceView {
            identity: self.identity,
            user_id: self.user_id,
            user_name: self.user_name.clone(),
            tier: self.tier,
            score: self.score,
            samples: self.rssi_samples.len(),
        }
    }
}
