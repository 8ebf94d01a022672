//! The device arena.
//!
//! One vector owns every [`ProximityEngine`]; two indices map transport
//! handles and identity keys onto positions in it. Records are never removed
//! individually, so a [`DeviceKey`] stays valid for the arena's lifetime.

use std::collections::HashMap;
use std::time::Instant;

use uuid::Uuid;

use nearby_types::TransportId;

use crate::config::ProximityConfig;
use crate::engine::ProximityEngine;
use crate::record::DeviceRecord;

/// Stable handle to a device in a [`DeviceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey(usize);

/// Outcome of merging a roster entry into the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Merge {
    /// A new record was added.
    Inserted(DeviceKey),
    /// An existing record with the same identity was updated.
    Updated {
        /// The existing record.
        key: DeviceKey,
        /// Transport handle released by the update, if any.
        released: Option<TransportId>,
    },
}

/// Arena of engines with lookup by transport handle and identity key.
#[derive(Debug)]
pub struct DeviceSet {
    engines: Vec<ProximityEngine>,
    by_transport: HashMap<TransportId, DeviceKey>,
    by_identity: HashMap<Uuid, DeviceKey>,
    config: ProximityConfig,
}

impl DeviceSet {
    /// Create an empty set whose engines share `config`.
    pub fn new(config: ProximityConfig) -> Self {
        Self {
            engines: Vec::new(),
            by_transport: HashMap::new(),
            by_identity: HashMap::new(),
            config,
        }
    }

    /// Number of tracked devices.
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    /// Borrow an engine.
    pub fn get(&self, key: DeviceKey) -> Option<&ProximityEngine> {
        self.engines.get(key.0)
    }

    /// Mutably borrow an engine.
    ///
    /// Callers must not change the transport handle through this; use
    /// [`DeviceSet::assign_identity`] so the index stays in sync.
    pub fn get_mut(&mut self, key: DeviceKey) -> Option<&mut ProximityEngine> {
        self.engines.get_mut(key.0)
    }

    /// Iterate over all records.
    pub fn records(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.engines.iter().map(ProximityEngine::record)
    }

    /// Look up by transport handle first, then by identity key.
    pub fn find(&self, transport_id: &TransportId, identity: Uuid) -> Option<DeviceKey> {
        self.by_transport
            .get(transport_id)
            .or_else(|| self.by_identity.get(&identity))
            .copied()
    }

    /// Look up by transport handle only.
    pub fn find_by_transport(&self, transport_id: &TransportId) -> Option<DeviceKey> {
        self.by_transport.get(transport_id).copied()
    }

    /// Look up by identity key only.
    pub fn find_by_identity(&self, identity: Uuid) -> Option<DeviceKey> {
        self.by_identity.get(&identity).copied()
    }

    /// Add a record reported by discovery.
    ///
    /// If the identity is already tracked the existing key is returned and
    /// nothing is inserted.
    pub fn insert_discovered(
        &mut self,
        transport_id: TransportId,
        identity: Uuid,
        now: Instant,
    ) -> DeviceKey {
        if let Some(key) = self.find(&transport_id, identity) {
            return key;
        }
        let record = DeviceRecord::discovered(transport_id, identity, now);
        self.push(record)
    }

    /// Merge a pre-built record by identity key.
    ///
    /// An unknown identity is inserted. A known one takes over the roster's
    /// user id and name when the roster entry carries a non-zero user id.
    pub fn merge(&mut self, record: DeviceRecord) -> Merge {
        match self.find_by_identity(record.identity()) {
            Some(key) => {
                let released = if record.user_id() != 0 {
                    self.assign_identity(key, record.user_id(), record.user_name().to_string())
                } else {
                    None
                };
                Merge::Updated { key, released }
            }
            None => Merge::Inserted(self.push(record)),
        }
    }

    /// Give an unidentified record without a handle a transport handle.
    ///
    /// Returns `false` if the record already has one or is identified.
    pub fn attach_transport(&mut self, key: DeviceKey, transport_id: TransportId) -> bool {
        let Some(engine) = self.engines.get_mut(key.0) else {
            return false;
        };
        let record = engine.record();
        if record.is_identified() || record.transport_id().is_some() {
            return false;
        }
        engine.attach_transport(transport_id.clone());
        self.by_transport.insert(transport_id, key);
        true
    }

    /// Assign identity to a record, keeping the transport index in sync.
    ///
    /// Returns the released transport handle, if any.
    pub fn assign_identity(
        &mut self,
        key: DeviceKey,
        user_id: i64,
        user_name: impl Into<String>,
    ) -> Option<TransportId> {
        let engine = self.engines.get_mut(key.0)?;
        let released = engine.assign_identity(user_id, user_name);
        if let Some(id) = &released {
            self.by_transport.remove(id);
        }
        released
    }

    /// Snapshot the keys of records matching `predicate`.
    pub fn select(&self, mut predicate: impl FnMut(&DeviceRecord) -> bool) -> Vec<DeviceKey> {
        self.engines
            .iter()
            .enumerate()
            .filter(|(_, engine)| predicate(engine.record()))
            .map(|(index, _)| DeviceKey(index))
            .collect()
    }

    /// Whether any record still holds a transport handle.
    pub(crate) fn has_live_transports(&self) -> bool {
        !self.by_transport.is_empty()
    }

    fn push(&mut self, record: DeviceRecord) -> DeviceKey {
        let key = DeviceKey(self.engines.len());
        if let Some(id) = record.transport_id() {
            self.by_transport.insert(id.clone(), key);
        }
        self.by_identity.insert(record.identity(), key);
        self.engines.push(ProximityEngine::new(record, self.config));
        key
    }
}

#[cfg(test)]
mod tests {
    use nearby_types::{KnownDevice, LifecycleState};

    use super::*;

    const KEY: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

    fn set() -> DeviceSet {
        DeviceSet::new(ProximityConfig::default())
    }

    #[test]
    fn test_repeated_discovery_is_idempotent() {
        let mut devices = set();
        let now = Instant::now();
        let id = TransportId::from("peer-a");
        let identity = Uuid::from_u128(1);
        let first = devices.insert_discovered(id.clone(), identity, now);
        let second = devices.insert_discovered(id.clone(), identity, now);
        assert_eq!(first, second);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices.find(&id, identity), Some(first));
    }

    #[test]
    fn test_find_falls_back_to_identity() {
        let mut devices = set();
        let now = Instant::now();
        let known = DeviceRecord::known(&KnownDevice::new(4, KEY, None), now).unwrap();
        let Merge::Inserted(key) = devices.merge(known) else {
            panic!("expected insert");
        };
        let identity = Uuid::parse_str(KEY).unwrap();
        assert_eq!(devices.find(&TransportId::from("unseen"), identity), Some(key));
        assert_eq!(
            devices.insert_discovered(TransportId::from("unseen"), identity, now),
            key
        );
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn test_assign_identity_drops_transport_index() {
        let mut devices = set();
        let now = Instant::now();
        let id = TransportId::from("peer-b");
        let key = devices.insert_discovered(id.clone(), Uuid::from_u128(2), now);
        assert!(devices.has_live_transports());

        assert_eq!(devices.assign_identity(key, 7, "Kay"), Some(id.clone()));
        assert!(!devices.has_live_transports());
        assert_eq!(devices.find_by_transport(&id), None);
        assert_eq!(devices.find_by_identity(Uuid::from_u128(2)), Some(key));
    }

    #[test]
    fn test_merge_updates_existing_identity() {
        let mut devices = set();
        let now = Instant::now();
        let identity = Uuid::parse_str(KEY).unwrap();
        let key = devices.insert_discovered(TransportId::from("peer-c"), identity, now);

        let known = DeviceRecord::known(&KnownDevice::new(11, KEY, Some("Mo")), now).unwrap();
        let merge = devices.merge(known);
        assert_eq!(
            merge,
            Merge::Updated {
                key,
                released: Some(TransportId::from("peer-c"))
            }
        );
        let record = devices.get(key).unwrap().record();
        assert_eq!(record.state(), LifecycleState::Identified);
        assert_eq!(record.user_name(), "Mo");
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn test_attach_transport_only_when_missing() {
        let mut devices = set();
        let now = Instant::now();
        let record = DeviceRecord::known(&KnownDevice::new(0, KEY, None), now).unwrap();
        let Merge::Inserted(key) = devices.merge(record) else {
            panic!("expected insert");
        };
        assert!(devices.attach_transport(key, TransportId::from("peer-d")));
        assert!(!devices.attach_transport(key, TransportId::from("peer-e")));
        assert_eq!(devices.find_by_transport(&TransportId::from("peer-d")), Some(key));
    }

    #[test]
    fn test_select_snapshots_keys() {
        let mut devices = set();
        let now = Instant::now();
        let a = devices.insert_discovered(TransportId::from("a"), Uuid::from_u128(10), now);
        let _b = devices.insert_discovered(TransportId::from("b"), Uuid::from_u128(11), now);
        devices.assign_identity(a, 1, "A");
        let unidentified = devices.select(|r| !r.is_identified());
        assert_eq!(unidentified.len(), 1);
        assert_ne!(unidentified[0], a);
    }
}
