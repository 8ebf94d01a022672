//! BLE proximity engine.
//!
//! This crate turns a noisy stream of BLE advertisement RSSI readings into a
//! coarse "who is physically near me" signal. Peripherals advertising the
//! proximity service are discovered, connected once to read a small identity
//! payload (`"<user id>,<display name>"`), and then tracked passively from
//! their advertisements.
//!
//! # Features
//!
//! - **Signal smoothing**: a rolling window of the last 10 RSSI samples per
//!   device, scored into Immediate / Near / Far / Unknown tiers
//! - **Staleness decay**: identified devices that go quiet accumulate penalty
//!   samples and fall out of Immediate without an explicit removal path
//! - **Identity handshake**: one connect-and-read per device, retried by the
//!   connect cycle until it succeeds
//! - **Known rosters**: seed devices whose identity is already known so they
//!   are reported without ever connecting
//! - **Radio abstraction**: [`BtleRadio`] for real hardware, [`MockRadio`] for tests
//!
//! # Architecture
//!
//! | Layer | Type | Role |
//! |-------|------|------|
//! | Per device | [`ProximityEngine`] | Sample window, staleness, scoring |
//! | Device set | [`DeviceSet`] | Arena with transport and identity indices |
//! | State machine | [`CoordinatorCore`] | Cycles and phase, no I/O |
//! | Driver | [`ScanCoordinator`] | tokio task executing core actions |
//!
//! # Platform Differences
//!
//! Transport ids follow the platform. On macOS they are CoreBluetooth UUIDs,
//! stable for a given device on a given Mac. On Linux and Windows they are
//! MAC addresses. Either way [`util::identity_for_transport`] derives a stable
//! identity key from them.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use nearby_core::{BtleOptions, BtleRadio, ProximityEvent, ScanCoordinator, ScannerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let radio = Arc::new(BtleRadio::new(BtleOptions::default()).await?);
//!     let mut coordinator = ScanCoordinator::new(radio, ScannerConfig::default());
//!     let mut events = coordinator.subscribe();
//!     coordinator.start().await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let ProximityEvent::Report(report) = event {
//!             println!("{} device(s) nearby", report.immediate.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod btle;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod mock;
pub mod radio;
pub mod record;
pub mod registry;
pub mod scanner;
pub mod util;

// Re-export types and uuid modules from nearby-types
pub use nearby_types::types;
pub use nearby_types::uuid;

// Core exports
pub use btle::{BtleOptions, BtleRadio, get_adapter};
pub use config::{DEFAULT_MAX_SAMPLES, DEFAULT_PENALTY_FLOOR, ProximityConfig, ScannerConfig};
pub use coordinator::{Action, CoordinatorCore, Phase};
pub use engine::{ProximityEngine, proximity_score};
pub use error::{ConnectionFailureReason, DeviceNotFoundReason, Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, ProximityEvent, ProximityReport};
pub use mock::MockRadio;
pub use radio::{Discovery, DiscoveryStream, Radio};
pub use record::DeviceRecord;
pub use registry::{DeviceKey, DeviceSet, Merge};
pub use scanner::{ImmediateCallback, ScanCoordinator};
pub use util::{create_transport_id, format_peripheral_id, identity_for_transport};

// Re-export from nearby-types for convenience
pub use nearby_types::{
    DeviceView, IdentityPayload, KnownDevice, LifecycleState, ParseError, ProximityTier,
    TierThresholds, TransportId,
};
