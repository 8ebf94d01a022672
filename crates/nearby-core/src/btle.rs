//! btleplug-backed radio.
//!
//! [`BtleRadio`] adapts the platform Bluetooth stack to the [`Radio`] trait.
//! Peripherals seen during discovery are cached by transport id so later
//! connect and read calls can find them again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use nearby_types::TransportId;

use crate::error::{ConnectionFailureReason, DeviceNotFoundReason, Error, Result};
use crate::radio::{Discovery, DiscoveryStream, Radio};
use crate::util::{create_transport_id, identity_for_transport};

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Timeouts applied to individual BLE operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BtleOptions {
    /// Maximum time for a connect attempt.
    pub connect_timeout: Duration,
    /// Maximum time for GATT service discovery.
    pub discovery_timeout: Duration,
    /// Maximum time for the identity read.
    pub read_timeout: Duration,
}

impl Default for BtleOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(8),
            discovery_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }
}

impl BtleOptions {
    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Radio backed by the first system Bluetooth adapter.
#[derive(Debug, Clone)]
pub struct BtleRadio {
    adapter: Adapter,
    options: BtleOptions,
    peripherals: Arc<RwLock<HashMap<TransportId, Peripheral>>>,
}

impl BtleRadio {
    /// Open the first available adapter.
    pub async fn new(options: BtleOptions) -> Result<Self> {
        let adapter = get_adapter().await?;
        Ok(Self::with_adapter(adapter, options))
    }

    /// Wrap an adapter the caller already holds.
    pub fn with_adapter(adapter: Adapter, options: BtleOptions) -> Self {
        Self {
            adapter,
            options,
            peripherals: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn peripheral(&self, id: &TransportId) -> Option<Peripheral> {
        self.peripherals.read().await.get(id).cloned()
    }
}

#[async_trait]
impl Radio for BtleRadio {
    async fn discoveries(&self, service: Uuid) -> Result<DiscoveryStream> {
        let events = self.adapter.events().await?;
        let adapter = self.adapter.clone();
        let peripherals = Arc::clone(&self.peripherals);

        let stream = events.filter_map(move |event| {
            let adapter = adapter.clone();
            let peripherals = Arc::clone(&peripherals);
            async move {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => return None,
                };
                let peripheral = adapter.peripheral(&id).await.ok()?;
                let props = peripheral.properties().await.ok()??;
                if !props.services.contains(&service) && !props.service_data.contains_key(&service)
                {
                    return None;
                }
                let rssi = props.rssi?;
                let transport_id = create_transport_id(&props.address.to_string(), &id);
                let identity = identity_for_transport(&transport_id);
                peripherals
                    .write()
                    .await
                    .insert(transport_id.clone(), peripheral);
                Some(Discovery {
                    transport_id,
                    identity,
                    rssi: f32::from(rssi),
                })
            }
        });
        Ok(Box::pin(stream))
    }

    async fn start_scan(&self, service: Uuid) -> Result<()> {
        info!(%service, "Starting BLE scan");
        self.adapter
            .start_scan(ScanFilter {
                services: vec![service],
            })
            .await?;
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        debug!("Stopping BLE scan");
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn connect(&self, id: &TransportId) -> Result<()> {
        let peripheral = self.peripheral(id).await.ok_or_else(|| {
            Error::connection_failed(
                Some(id.to_string()),
                ConnectionFailureReason::UnknownPeripheral,
            )
        })?;

        debug!(%id, "Connecting");
        match timeout(self.options.connect_timeout, peripheral.connect()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::connection_failed(
                Some(id.to_string()),
                ConnectionFailureReason::BleError(e.to_string()),
            )),
            Err(_) => Err(Error::connection_failed(
                Some(id.to_string()),
                ConnectionFailureReason::Timeout,
            )),
        }
    }

    async fn read_identity(
        &self,
        id: &TransportId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Bytes> {
        let peripheral = self
            .peripheral(id)
            .await
            .ok_or_else(|| Error::device_not_found(id.as_str()))?;
        if !peripheral.is_connected().await.unwrap_or(false) {
            return Err(Error::NotConnected);
        }

        timeout(self.options.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", self.options.discovery_timeout))??;

        let services = peripheral.services();
        let target = services
            .iter()
            .filter(|s| s.uuid == service)
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.uuid == characteristic)
            .cloned()
            .ok_or_else(|| Error::characteristic_not_found(characteristic.to_string(), services.len()))?;

        let data = timeout(self.options.read_timeout, peripheral.read(&target))
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("read characteristic {}", characteristic),
                duration: self.options.read_timeout,
            })??;
        debug!(%id, bytes = data.len(), "Read identity payload");
        Ok(Bytes::from(data))
    }

    async fn disconnect(&self, id: &TransportId) -> Result<()> {
        let Some(peripheral) = self.peripheral(id).await else {
            return Ok(());
        };
        if peripheral.is_connected().await.unwrap_or(false) {
            peripheral.disconnect().await?;
        }
        Ok(())
    }
}
