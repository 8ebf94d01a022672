//! The radio-layer boundary.
//!
//! This module provides the [`Radio`] trait that abstracts over the real
//! btleplug backend ([`crate::BtleRadio`]) and the scripted
//! [`crate::MockRadio`] used in tests.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use uuid::Uuid;

use nearby_types::TransportId;

use crate::error::Result;

/// One advertisement sighting.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    /// Radio-layer handle for connecting to the peripheral.
    pub transport_id: TransportId,
    /// Stable identity key derived from the peripheral.
    pub identity: Uuid,
    /// Received signal strength.
    pub rssi: f32,
}

/// Stream of discovery events. Duplicates are expected.
pub type DiscoveryStream = Pin<Box<dyn Stream<Item = Discovery> + Send>>;

/// Operations the coordinator needs from a BLE stack.
///
/// Every method is asynchronous and may complete on any task; the
/// coordinator marshals results back into its own loop before touching
/// device state.
///
/// # Example
///
/// ```ignore
/// use nearby_core::{Radio, Result};
/// use nearby_types::TransportId;
///
/// async fn identify<R: Radio>(radio: &R, id: &TransportId) -> Result<()> {
///     radio.connect(id).await?;
///     let payload = radio.read_identity(id, service, characteristic).await;
///     radio.disconnect(id).await?;
///     println!("{:?}", payload);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Radio: Send + Sync + 'static {
    /// Subscribe to discovery events for peripherals advertising `service`.
    ///
    /// The stream stays open across [`Radio::start_scan`] and
    /// [`Radio::stop_scan`]; events only flow while a scan is active.
    async fn discoveries(&self, service: Uuid) -> Result<DiscoveryStream>;

    /// Begin scanning for `service`.
    async fn start_scan(&self, service: Uuid) -> Result<()>;

    /// Stop scanning.
    async fn stop_scan(&self) -> Result<()>;

    /// Connect to a peripheral.
    async fn connect(&self, id: &TransportId) -> Result<()>;

    /// Read the identity characteristic from a connected peripheral.
    async fn read_identity(
        &self,
        id: &TransportId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Bytes>;

    /// Disconnect a peripheral, or cancel a pending connect.
    async fn disconnect(&self, id: &TransportId) -> Result<()>;
}
