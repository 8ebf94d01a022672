//! Mock radio implementation for testing.
//!
//! This module provides a scripted radio that can be used to test the scan
//! coordinator without requiring actual BLE hardware.
//!
//! The [`MockRadio`] implements the [`Radio`] trait, so it can be handed to
//! [`crate::ScanCoordinator`] in place of [`crate::BtleRadio`].
//!
//! # Features
//!
//! - **Scripted discovery**: push advertisements with [`MockRadio::discover`];
//!   they only reach subscribers while a scan is running
//! - **Failure injection**: make connects or identity reads fail per peer
//! - **Latency simulation**: delay connects to keep them outstanding
//! - **Call recording**: inspect scan, connect and disconnect traffic

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use nearby_types::TransportId;

use crate::error::{ConnectionFailureReason, Error, Result};
use crate::radio::{Discovery, DiscoveryStream, Radio};

/// A scripted radio for testing.
///
/// # Example
///
/// ```
/// use nearby_core::{MockRadio, Radio};
/// use nearby_types::TransportId;
///
/// #[tokio::main]
/// async fn main() {
///     let radio = MockRadio::new();
///     let peer = TransportId::from("peer-1");
///     radio.set_payload(&peer, "42,Ada").await;
///
///     radio.connect(&peer).await.unwrap();
///     let payload = radio
///         .read_identity(&peer, uuid::Uuid::nil(), uuid::Uuid::nil())
///         .await
///         .unwrap();
///     assert_eq!(&payload[..], b"42,Ada");
/// }
/// ```
pub struct MockRadio {
    scanning: AtomicBool,
    discoveries: broadcast::Sender<Discovery>,
    payloads: RwLock<HashMap<TransportId, Bytes>>,
    connected: RwLock<HashSet<TransportId>>,
    fail_connect: RwLock<HashSet<TransportId>>,
    fail_read: RwLock<HashSet<TransportId>>,
    connect_calls: RwLock<Vec<TransportId>>,
    disconnect_calls: RwLock<Vec<TransportId>>,
    scan_starts: AtomicU32,
    scan_stops: AtomicU32,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRadio")
            .field("scanning", &self.is_scanning())
            .field("scan_starts", &self.scan_starts())
            .field("scan_stops", &self.scan_stops())
            .finish_non_exhaustive()
    }
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRadio {
    /// Create an idle radio with no peers.
    pub fn new() -> Self {
        let (discoveries, _) = broadcast::channel(256);
        Self {
            scanning: AtomicBool::new(false),
            discoveries,
            payloads: RwLock::new(HashMap::new()),
            connected: RwLock::new(HashSet::new()),
            fail_connect: RwLock::new(HashSet::new()),
            fail_read: RwLock::new(HashSet::new()),
            connect_calls: RwLock::new(Vec::new()),
            disconnect_calls: RwLock::new(Vec::new()),
            scan_starts: AtomicU32::new(0),
            scan_stops: AtomicU32::new(0),
            connect_latency_ms: AtomicU64::new(0),
        }
    }

    /// Generate a random transport id in the same shape for every call site.
    pub fn random_peer() -> TransportId {
        TransportId::new(format!("MOCK-{:06X}", rand::random::<u32>() % 0xFFFFFF))
    }

    /// Advertise a peer. Returns `false` (and drops the event) when not scanning.
    pub fn discover(&self, transport_id: &TransportId, identity: Uuid, rssi: f32) -> bool {
        if !self.is_scanning() {
            return false;
        }
        let _ = self.discoveries.send(Discovery {
            transport_id: transport_id.clone(),
            identity,
            rssi,
        });
        true
    }

    /// Set the identity payload a peer serves.
    pub async fn set_payload(&self, transport_id: &TransportId, payload: impl Into<Bytes>) {
        self.payloads
            .write()
            .await
            .insert(transport_id.clone(), payload.into());
    }

    /// Make connects to a peer fail.
    pub async fn fail_connect(&self, transport_id: &TransportId, fail: bool) {
        toggle(&self.fail_connect, transport_id, fail).await;
    }

    /// Make identity reads from a peer fail.
    pub async fn fail_read(&self, transport_id: &TransportId, fail: bool) {
        toggle(&self.fail_read, transport_id, fail).await;
    }

    /// Set simulated connect latency.
    ///
    /// When set, each connect waits this long before completing. Useful for
    /// keeping connects outstanding past the rescan deadline.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    /// Number of `start_scan` calls.
    pub fn scan_starts(&self) -> u32 {
        self.scan_starts.load(Ordering::Relaxed)
    }

    /// Number of `stop_scan` calls.
    pub fn scan_stops(&self) -> u32 {
        self.scan_stops.load(Ordering::Relaxed)
    }

    /// Every connect request, in order.
    pub async fn connect_calls(&self) -> Vec<TransportId> {
        self.connect_calls.read().await.clone()
    }

    /// Every disconnect request, in order.
    pub async fn disconnect_calls(&self) -> Vec<TransportId> {
        self.disconnect_calls.read().await.clone()
    }

    /// Whether a peer is currently connected.
    pub async fn is_connected(&self, transport_id: &TransportId) -> bool {
        self.connected.read().await.contains(transport_id)
    }
}

async fn toggle(set: &RwLock<HashSet<TransportId>>, transport_id: &TransportId, on: bool) {
    let mut set = set.write().await;
    if on {
        set.insert(transport_id.clone());
    } else {
        set.remove(transport_id);
    }
}

#[async_trait]
impl Radio for MockRadio {
    async fn discoveries(&self, _service: Uuid) -> Result<DiscoveryStream> {
        let rx = self.discoveries.subscribe();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(discovery) => return Some((discovery, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn start_scan(&self, _service: Uuid) -> Result<()> {
        self.scan_starts.fetch_add(1, Ordering::Relaxed);
        self.scanning.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.scan_stops.fetch_add(1, Ordering::Relaxed);
        self.scanning.store(false, Ordering::Relaxed);
        Ok(())
    }

    async fn connect(&self, id: &TransportId) -> Result<()> {
        self.connect_calls.write().await.push(id.clone());

        let latency = self.connect_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.fail_connect.read().await.contains(id) {
            return Err(Error::connection_failed(
                Some(id.to_string()),
                ConnectionFailureReason::Rejected,
            ));
        }
        self.connected.write().await.insert(id.clone());
        Ok(())
    }

    async fn read_identity(
        &self,
        id: &TransportId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Bytes> {
        if !self.connected.read().await.contains(id) {
            return Err(Error::NotConnected);
        }
        if self.fail_read.read().await.contains(id) {
            return Err(Error::characteristic_not_found(characteristic.to_string(), 0));
        }
        match self.payloads.read().await.get(id) {
            Some(payload) => Ok(payload.clone()),
            None => {
                tracing::debug!(%id, %service, "Mock peer has no identity payload");
                Err(Error::characteristic_not_found(characteristic.to_string(), 1))
            }
        }
    }

    async fn disconnect(&self, id: &TransportId) -> Result<()> {
        self.disconnect_calls.write().await.push(id.clone());
        self.connected.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn test_discoveries_only_while_scanning() {
        let radio = MockRadio::new();
        let mut stream = radio.discoveries(Uuid::nil()).await.unwrap();
        let peer = TransportId::from("peer-1");

        assert!(!radio.discover(&peer, Uuid::from_u128(1), -60.0));
        radio.start_scan(Uuid::nil()).await.unwrap();
        assert!(radio.discover(&peer, Uuid::from_u128(1), -61.0));

        let seen = stream.next().await.unwrap();
        assert_eq!(seen.rssi, -61.0);
        assert_eq!(seen.transport_id, peer);
    }

    #[tokio::test]
    async fn test_read_requires_connection() {
        let radio = MockRadio::new();
        let peer = TransportId::from("peer-1");
        radio.set_payload(&peer, "1,A").await;
        let err = radio
            .read_identity(&peer, Uuid::nil(), Uuid::nil())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        radio.connect(&peer).await.unwrap();
        assert!(radio.is_connected(&peer).await);
        radio.disconnect(&peer).await.unwrap();
        assert!(!radio.is_connected(&peer).await);
        assert_eq!(radio.disconnect_calls().await, vec![peer]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let radio = MockRadio::new();
        let peer = MockRadio::random_peer();
        radio.fail_connect(&peer, true).await;
        assert!(matches!(
            radio.connect(&peer).await,
            Err(Error::ConnectionFailed { .. })
        ));

        radio.fail_connect(&peer, false).await;
        radio.fail_read(&peer, true).await;
        radio.set_payload(&peer, "1,A").await;
        radio.connect(&peer).await.unwrap();
        assert!(radio.read_identity(&peer, Uuid::nil(), Uuid::nil()).await.is_err());
        assert_eq!(radio.connect_calls().await.len(), 2);
    }

    #[test]
    fn test_random_peer_shape() {
        let peer = MockRadio::random_peer();
        assert!(peer.as_str().starts_with("MOCK-"));
        assert_eq!(peer.as_str().len(), 11);
    }
}
