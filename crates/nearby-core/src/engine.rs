//! Per-device signal processing.
//!
//! [`ProximityEngine`] owns one [`DeviceRecord`] and turns the noisy RSSI
//! stream for that device into a [`ProximityTier`].
//!
//! # Scoring
//!
//! Samples are folded in arrival order. A sample at or below `-25` is added
//! to the running sum as-is. A sample above `-25` is implausibly strong and is
//! replaced by the mean of the terms summed so far; if that mean is itself
//! above `-25` (or there is no prior term) `-55` is used instead. The sum is
//! divided by a fixed divisor rather than the sample count, so a device with a
//! short history scores closer to zero.
//!
//! ```
//! use nearby_core::engine::proximity_score;
//!
//! assert_eq!(proximity_score([-60.0; 10], 10.0), -60.0);
//! assert_eq!(proximity_score([], 10.0), 0.0);
//! ```

use std::time::Instant;

use tracing::trace;

use nearby_types::{LifecycleState, ProximityTier, TransportId};

use crate::config::ProximityConfig;
use crate::record::DeviceRecord;

/// Samples above this value are treated as outliers.
pub const OUTLIER_CEILING: f32 = -25.0;

/// Replacement term for an outlier with no usable running mean.
pub const OUTLIER_SUBSTITUTE: f32 = -55.0;

/// Compute the proximity score for a sample sequence.
pub fn proximity_score(samples: impl IntoIterator<Item = f32>, divisor: f32) -> f32 {
    let mut proximity = 0.0f32;
    let mut i = 0.0f32;
    for rssi in samples {
        if rssi > OUTLIER_CEILING {
            let mut term = if i > 0.0 { proximity / i } else { 0.0 };
            if term > OUTLIER_CEILING {
                term = OUTLIER_SUBSTITUTE;
            }
            proximity += term;
        } else {
            proximity += rssi;
        }
        i += 1.0;
    }
    proximity / divisor
}

/// Signal pipeline for a single device.
#[derive(Debug, Clone)]
pub struct ProximityEngine {
    record: DeviceRecord,
    config: ProximityConfig,
}

impl ProximityEngine {
    /// Wrap a record with the given settings.
    pub fn new(record: DeviceRecord, config: ProximityConfig) -> Self {
        Self { record, config }
    }

    /// The managed record.
    pub fn record(&self) -> &DeviceRecord {
        &self.record
    }

    /// Consume the engine, returning its record.
    pub fn into_record(self) -> DeviceRecord {
        self.record
    }

    /// Record a real RSSI reading.
    ///
    /// A fresh reading proves the device is alive, so penalty samples are
    /// purged before it is appended.
    pub fn ingest_sample(&mut self, rssi: f32, now: Instant) {
        let floor = self.config.penalty_floor;
        self.record.rssi_samples.retain(|&s| s > floor);
        self.push_sample(rssi);
        self.record.last_sample_at = now;
        trace!(
            identity = %self.record.identity,
            rssi,
            samples = self.record.rssi_samples.len(),
            "Ingested sample"
        );
    }

    /// Append a penalty sample if an identified device has gone quiet.
    ///
    /// Returns `true` if a penalty was applied.
    pub fn check_staleness(&mut self, now: Instant) -> bool {
        if self.record.state != LifecycleState::Identified {
            return false;
        }
        let silent_for = now.saturating_duration_since(self.record.last_sample_at);
        if silent_for > self.config.staleness_timeout {
            self.push_sample(self.config.penalty_floor);
            trace!(identity = %self.record.identity, ?silent_for, "Applied staleness penalty");
            true
        } else {
            false
        }
    }

    /// Recompute the score and tier from the current samples.
    pub fn recompute_proximity_tier(&mut self) -> ProximityTier {
        let score = proximity_score(self.record.samples(), self.config.score_divisor);
        self.record.score = score;
        self.record.tier = self.config.thresholds.classify(score);
        self.record.tier
    }

    /// Store the identity read from the device.
    ///
    /// A non-zero user id completes the lifecycle: the record becomes
    /// Identified and gives up its transport handle, which is returned so the
    /// caller can ask the radio layer to disconnect it.
    pub fn assign_identity(&mut self, user_id: i64, user_name: impl Into<String>) -> Option<TransportId> {
        self.record.user_id = user_id;
        self.record.user_name = user_name.into();
        if user_id != 0 {
            self.record.state = LifecycleState::Identified;
            self.record.transport_id.take()
        } else {
            None
        }
    }

    /// Move an unidentified record into Connecting.
    ///
    /// Returns `false` for identified records, which never go back.
    pub fn mark_connecting(&mut self) -> bool {
        match self.record.state {
            LifecycleState::Identified => false,
            LifecycleState::AwaitingData | LifecycleState::Connecting => {
                self.record.state = LifecycleState::Connecting;
                true
            }
        }
    }

    pub(crate) fn attach_transport(&mut self, transport_id: TransportId) {
        self.record.transport_id = Some(transport_id);
    }

    fn push_sample(&mut self, value: f32) {
        let samples = &mut self.record.rssi_samples;
        samples.push_back(value);
        while samples.len() > self.config.max_samples {
            samples.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use nearby_types::KnownDevice;
    use uuid::Uuid;

    use super::*;

    fn awaiting(now: Instant) -> ProximityEngine {
        let record = DeviceRecord::discovered(TransportId::from("peer-1"), Uuid::nil(), now);
        ProximityEngine::new(record, ProximityConfig::default())
    }

    fn identified(now: Instant) -> ProximityEngine {
        let known = KnownDevice::new(1, "0f8fad5b-d9cb-469f-a165-70867728950e", None);
        let record = DeviceRecord::known(&known, now).unwrap();
        ProximityEngine::new(record, ProximityConfig::default())
    }

    fn samples(engine: &ProximityEngine) -> Vec<f32> {
        engine.record().samples().collect()
    }

    #[test]
    fn test_flat_sixty_is_immediate() {
        let now = Instant::now();
        let mut engine = identified(now);
        for _ in 0..10 {
            engine.ingest_sample(-60.0, now);
        }
        assert_eq!(engine.recompute_proximity_tier(), ProximityTier::Immediate);
        assert_eq!(engine.record().score(), -60.0);
    }

    #[test]
    fn test_empty_history_is_unknown() {
        let mut engine = identified(Instant::now());
        assert_eq!(engine.recompute_proximity_tier(), ProximityTier::Unknown);
        assert_eq!(engine.record().score(), 0.0);
    }

    #[test]
    fn test_boundary_scores() {
        // -900 / 10 = -90 → Near
        assert_eq!(proximity_score([-90.0; 10], 10.0), -90.0);
        let mut engine = identified(Instant::now());
        for _ in 0..10 {
            engine.ingest_sample(-90.0, Instant::now());
        }
        assert_eq!(engine.recompute_proximity_tier(), ProximityTier::Near);

        let mut engine = identified(Instant::now());
        for _ in 0..10 {
            engine.ingest_sample(-72.0, Instant::now());
        }
        assert_eq!(engine.recompute_proximity_tier(), ProximityTier::Immediate);
    }

    #[test]
    fn test_short_history_is_penalized() {
        // Three strong samples only reach -18 with the fixed divisor.
        assert_eq!(proximity_score([-60.0; 3], 10.0), -18.0);
    }

    #[test]
    fn test_outlier_branch() {
        // First sample is an outlier with no prior mean: -55.
        assert_eq!(proximity_score([-10.0], 1.0), -55.0);
        // Prior mean of -80 replaces the outlier.
        assert_eq!(proximity_score([-80.0, -80.0, -5.0], 1.0), -240.0);
        // Consecutive outliers inherit the substitute through the running mean.
        assert_eq!(proximity_score([-20.0, -5.0], 1.0), -110.0);
    }

    #[test]
    fn test_ingest_caps_window() {
        let now = Instant::now();
        let mut engine = awaiting(now);
        for i in 0..15 {
            engine.ingest_sample(-40.0 - i as f32, now);
        }
        let kept = samples(&engine);
        assert_eq!(kept.len(), 10);
        assert_eq!(kept.first(), Some(&-45.0));
        assert_eq!(kept.last(), Some(&-54.0));
    }

    #[test]
    fn test_ingest_purges_penalties() {
        let start = Instant::now();
        let mut engine = identified(start);
        engine.ingest_sample(-60.0, start);
        let later = start + Duration::from_secs(4);
        assert!(engine.check_staleness(later));
        assert!(engine.check_staleness(later));
        assert_eq!(samples(&engine), vec![-60.0, -100.0, -100.0]);

        engine.ingest_sample(-61.0, later);
        assert_eq!(samples(&engine), vec![-60.0, -61.0]);
    }

    #[test]
    fn test_staleness_requires_identified() {
        let start = Instant::now();
        let mut engine = awaiting(start);
        engine.ingest_sample(-60.0, start);
        assert!(!engine.check_staleness(start + Duration::from_secs(60)));
        assert_eq!(engine.record().sample_count(), 1);
    }

    #[test]
    fn test_staleness_timeout_is_exclusive() {
        let start = Instant::now();
        let mut engine = identified(start);
        engine.ingest_sample(-60.0, start);
        assert!(!engine.check_staleness(start + Duration::from_secs(3)));
        assert!(engine.check_staleness(start + Duration::from_millis(3001)));
        assert_eq!(engine.record().sample_count(), 2);
    }

    #[test]
    fn test_stale_device_decays_out_of_immediate() {
        let start = Instant::now();
        let mut engine = identified(start);
        for _ in 0..10 {
            engine.ingest_sample(-60.0, start);
        }
        let mut tick = start;
        let mut tiers = Vec::new();
        for _ in 0..10 {
            tick += Duration::from_secs(4);
            engine.check_staleness(tick);
            tiers.push(engine.recompute_proximity_tier());
        }
        assert_eq!(tiers.first(), Some(&ProximityTier::Immediate));
        assert_eq!(tiers.last(), Some(&ProximityTier::Far));
    }

    #[test]
    fn test_assign_zero_does_not_identify() {
        let mut engine = awaiting(Instant::now());
        assert!(engine.assign_identity(0, "x").is_none());
        assert_eq!(engine.record().state(), LifecycleState::AwaitingData);
        assert_eq!(engine.record().user_name(), "x");
        assert!(engine.record().transport_id().is_some());
    }

    #[test]
    fn test_assign_identity_releases_handle() {
        let mut engine = awaiting(Instant::now());
        assert!(engine.mark_connecting());
        let released = engine.assign_identity(42, "x");
        assert_eq!(released, Some(TransportId::from("peer-1")));
        assert_eq!(engine.record().state(), LifecycleState::Identified);
        assert_eq!(engine.record().user_id(), 42);
        assert!(engine.record().transport_id().is_none());
    }

    #[test]
    fn test_identified_never_reconnects() {
        let mut engine = identified(Instant::now());
        assert!(!engine.mark_connecting());
        assert_eq!(engine.record().state(), LifecycleState::Identified);
    }
}

#[cfg(test)]
mod proptests {
    use std::time::Duration;

    use nearby_types::KnownDevice;
    use proptest::prelude::*;

    use super::*;

    fn engine() -> (ProximityEngine, Instant) {
        let now = Instant::now();
        let known = KnownDevice::new(3, "0f8fad5b-d9cb-469f-a165-70867728950e", None);
        let record = DeviceRecord::known(&known, now).unwrap();
        (ProximityEngine::new(record, ProximityConfig::default()), now)
    }

    proptest! {
        #[test]
        fn window_never_exceeds_cap(values in proptest::collection::vec(-120.0f32..0.0, 0..64)) {
            let (mut engine, now) = engine();
            for v in &values {
                engine.ingest_sample(*v, now);
                prop_assert!(engine.record().sample_count() <= 10);
            }
        }

        #[test]
        fn window_holds_most_recent_survivors(values in proptest::collection::vec(-120.0f32..0.0, 1..64)) {
            let (mut engine, now) = engine();
            let mut model: Vec<f32> = Vec::new();
            for v in &values {
                engine.ingest_sample(*v, now);
                model.retain(|&s| s > -100.0);
                model.push(*v);
                if model.len() > 10 {
                    model.remove(0);
                }
            }
            let kept: Vec<f32> = engine.record().samples().collect();
            prop_assert_eq!(kept, model);
        }

        #[test]
        fn real_sample_clears_penalties(stale_ticks in 1usize..15, rssi in -99.0f32..-30.0) {
            let (mut engine, start) = engine();
            engine.ingest_sample(-60.0, start);
            let mut now = start;
            for _ in 0..stale_ticks {
                now += Duration::from_secs(4);
                engine.check_staleness(now);
            }
            engine.ingest_sample(rssi, now);
            prop_assert!(engine.record().samples().all(|s| s > -100.0));
        }

        #[test]
        fn score_is_deterministic(values in proptest::collection::vec(-150.0f32..0.0, 0..10)) {
            prop_assert_eq!(
                proximity_score(values.iter().copied(), 10.0).to_bits(),
                proximity_score(values.iter().copied(), 10.0).to_bits()
            );
        }
    }
}
