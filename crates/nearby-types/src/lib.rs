//! Platform-agnostic types for BLE proximity detection.
//!
//! This crate provides the value types shared by the proximity engine
//! (nearby-core) and its front ends.
//!
//! # Features
//!
//! - Lifecycle and proximity-tier enums
//! - Score thresholds and classification
//! - Identity payload parsing
//! - UUID constants for the identity service
//!
//! # Example
//!
//! ```
//! use nearby_types::{IdentityPayload, ProximityTier, TierThresholds};
//!
//! let payload = IdentityPayload::parse(b"42,Ada").unwrap();
//! assert_eq!(payload.user_id, 42);
//!
//! assert_eq!(TierThresholds::default().classify(-60.0), ProximityTier::Immediate);
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use types::{
    DeviceView, IdentityPayload, KnownDevice, LifecycleState, ProximityTier, TierThresholds,
    TransportId,
};
pub use uuid as uuids;

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn payload_roundtrips_any_name_without_commas(
            id in any::<i64>(),
            name in "[^,]{0,32}",
        ) {
            let text = format!("{id},{name}");
            let payload = IdentityPayload::parse(text.as_bytes()).unwrap();
            prop_assert_eq!(payload.user_id, id);
            prop_assert_eq!(payload.user_name, name);
        }

        #[test]
        fn payload_parse_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = IdentityPayload::parse(&data);
        }

        #[test]
        fn classify_is_total_and_ordered(score in -400.0f32..100.0) {
            let t = TierThresholds::default();
            let tier = t.classify(score);
            if score >= 0.0 || score < -200.0 {
                prop_assert_eq!(tier, ProximityTier::Unknown);
            } else {
                prop_assert_ne!(tier, ProximityTier::Unknown);
            }
        }
    }
}
