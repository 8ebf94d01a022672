//! The coordinator state machine.
//!
//! [`CoordinatorCore`] owns the device set and the three cycle deadlines but
//! performs no I/O. Every input (discovery, identity read, connect failure,
//! timer tick) returns the [`Action`]s the caller must carry out against the
//! radio layer. [`crate::ScanCoordinator`] drives it from a tokio task; tests
//! drive it directly with synthetic instants.
//!
//! Discovery and connecting never overlap. While the phase is
//! [`Phase::Connecting`] the connect and report deadlines are disarmed and
//! only the rescan deadline (or the last pending connect resolving) moves the
//! machine back to [`Phase::Scanning`].

use std::collections::HashSet;
use std::fmt;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info, warn};

use nearby_types::{DeviceView, IdentityPayload, KnownDevice, LifecycleState, TransportId};

use crate::config::ScannerConfig;
use crate::error::{Error, Result};
use crate::events::{ProximityEvent, ProximityReport};
use crate::radio::Discovery;
use crate::record::DeviceRecord;
use crate::registry::{DeviceKey, DeviceSet, Merge};

/// Which radio activity the coordinator currently owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Not started, or stopped.
    #[default]
    Idle,
    /// Discovery is running; report and connect cycles are armed.
    Scanning,
    /// Discovery is stopped while identity connects are outstanding.
    Connecting,
}

/// Work the caller must perform on behalf of the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Start discovery.
    StartScan,
    /// Stop discovery.
    StopScan,
    /// Connect and read the identity characteristic.
    Connect(TransportId),
    /// Disconnect or cancel a pending connect.
    Disconnect(TransportId),
    /// Deliver an event to the application.
    Notify(ProximityEvent),
}

/// Sans-IO coordinator.
#[derive(Debug)]
pub struct CoordinatorCore {
    config: ScannerConfig,
    devices: DeviceSet,
    phase: Phase,
    in_flight: HashSet<TransportId>,
    report_due: Option<Instant>,
    connect_due: Option<Instant>,
    rescan_due: Option<Instant>,
}

impl CoordinatorCore {
    /// Create an idle core with an empty device set.
    pub fn new(config: ScannerConfig) -> Self {
        let devices = DeviceSet::new(config.proximity);
        Self {
            config,
            devices,
            phase: Phase::Idle,
            in_flight: HashSet::new(),
            report_due: None,
            connect_due: None,
            rescan_due: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The tracked devices.
    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    /// Clone every record.
    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.devices.records().cloned().collect()
    }

    /// Connects issued and not yet resolved.
    pub fn pending_connects(&self) -> usize {
        self.in_flight.len()
    }

    /// Earliest armed deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.rescan_due, self.connect_due, self.report_due]
            .into_iter()
            .flatten()
            .min()
    }

    /// Seed the device set from a roster, merging by identity key.
    ///
    /// Entries with an unparseable identity key are skipped.
    pub fn configure(&mut self, roster: &[KnownDevice], now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        let mut merged = 0usize;
        for entry in roster {
            let Some(record) = DeviceRecord::known(entry, now) else {
                warn!(
                    identity_key = %entry.identity_key,
                    user_id = entry.user_id,
                    "Skipping roster entry with invalid identity key"
                );
                continue;
            };
            merged += 1;
            if let Merge::Updated {
                released: Some(id), ..
            } = self.devices.merge(record)
            {
                self.in_flight.remove(&id);
                actions.push(Action::Disconnect(id));
            }
        }
        info!(merged, total = self.devices.len(), "Roster configured");
        if self.phase == Phase::Connecting {
            self.resume_if_settled(now, &mut actions);
        }
        actions
    }

    /// Begin discovery and arm the report and connect cycles.
    ///
    /// Does nothing unless the core is idle.
    pub fn start(&mut self, now: Instant) -> Vec<Action> {
        if self.phase != Phase::Idle {
            debug!(phase = ?self.phase, "Already started");
            return Vec::new();
        }
        self.phase = Phase::Scanning;
        self.report_due = Some(now + self.config.report_interval);
        self.connect_due = Some(now + self.config.connect_poll_interval);
        self.rescan_due = None;
        info!(devices = self.devices.len(), "Scanning started");
        vec![Action::StartScan]
    }

    /// Disarm every cycle and release the radio session.
    ///
    /// Outstanding connects are cancelled. Safe to call when idle.
    pub fn stop(&mut self) -> Vec<Action> {
        if self.phase == Phase::Idle {
            return Vec::new();
        }
        let mut actions = vec![Action::StopScan];
        self.disconnect_connecting(&mut actions);
        self.in_flight.clear();
        self.phase = Phase::Idle;
        self.report_due = None;
        self.connect_due = None;
        self.rescan_due = None;
        info!("Scanning stopped");
        actions
    }

    /// Route a discovery event into its record, creating one if new.
    pub fn on_discovery(&mut self, discovery: &Discovery, now: Instant) -> Vec<Action> {
        if self.phase == Phase::Idle {
            return Vec::new();
        }
        let mut actions = Vec::new();
        let key = match self.devices.find(&discovery.transport_id, discovery.identity) {
            Some(key) => {
                // Roster entries that are still unidentified pick up the handle here.
                self.devices
                    .attach_transport(key, discovery.transport_id.clone());
                key
            }
            None => {
                let key = self.devices.insert_discovered(
                    discovery.transport_id.clone(),
                    discovery.identity,
                    now,
                );
                debug!(
                    transport_id = %discovery.transport_id,
                    identity = %discovery.identity,
                    rssi = discovery.rssi,
                    "Discovered device"
                );
                actions.push(Action::Notify(ProximityEvent::Discovered {
                    identity: discovery.identity,
                    transport_id: discovery.transport_id.clone(),
                    rssi: discovery.rssi,
                }));
                key
            }
        };
        if let Some(engine) = self.devices.get_mut(key) {
            engine.ingest_sample(discovery.rssi, now);
        }
        actions
    }

    /// Handle the outcome of a connect-and-read.
    ///
    /// The handle is always disconnected afterwards. When that resolves the
    /// last outstanding connect, discovery resumes at once instead of waiting
    /// for the rescan deadline.
    pub fn on_identity(
        &mut self,
        transport_id: &TransportId,
        result: Result<Bytes>,
        now: Instant,
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.phase == Phase::Idle {
            actions.push(Action::Disconnect(transport_id.clone()));
            return actions;
        }
        self.in_flight.remove(transport_id);

        match self.devices.find_by_transport(transport_id) {
            Some(key) => {
                let parsed = result
                    .and_then(|bytes| IdentityPayload::parse(&bytes).map_err(Error::from));
                match parsed {
                    Ok(payload) if payload.user_id != 0 => {
                        self.identify(key, payload, &mut actions);
                    }
                    Ok(_) => {
                        self.reject(transport_id, "user id 0", &mut actions);
                    }
                    Err(err) => {
                        self.reject(transport_id, err, &mut actions);
                    }
                }
            }
            None => {
                debug!(%transport_id, "Identity read for untracked handle");
            }
        }
        actions.push(Action::Disconnect(transport_id.clone()));
        self.resume_if_settled(now, &mut actions);
        actions
    }

    /// Handle a failed connect. The record stays Connecting and is retried.
    pub fn on_connect_failed(
        &mut self,
        transport_id: &TransportId,
        reason: impl fmt::Display,
        now: Instant,
    ) -> Vec<Action> {
        let mut actions = vec![Action::Disconnect(transport_id.clone())];
        if self.phase == Phase::Idle {
            return actions;
        }
        self.in_flight.remove(transport_id);
        warn!(%transport_id, %reason, "Connect failed");
        actions.insert(
            0,
            Action::Notify(ProximityEvent::ConnectFailed {
                transport_id: transport_id.clone(),
                reason: reason.to_string(),
            }),
        );
        self.resume_if_settled(now, &mut actions);
        actions
    }

    /// Fire every deadline that has passed: rescan, then connect, then report.
    pub fn tick(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();
        if is_due(self.rescan_due, now) {
            self.rescan(now, &mut actions);
        }
        if is_due(self.connect_due, now) {
            self.connect_cycle(now, &mut actions);
        }
        if is_due(self.report_due, now) {
            self.report(now, &mut actions);
        }
        actions
    }

    fn connect_cycle(&mut self, now: Instant, actions: &mut Vec<Action>) {
        self.connect_due = None;
        if self.phase != Phase::Scanning {
            return;
        }
        let pending = self
            .devices
            .select(|r| !r.is_identified() && r.transport_id().is_some());
        if pending.is_empty() {
            self.connect_due = Some(now + self.config.connect_poll_interval);
            return;
        }

        self.report_due = None;
        actions.push(Action::StopScan);
        for key in pending {
            let Some(engine) = self.devices.get_mut(key) else {
                continue;
            };
            engine.mark_connecting();
            let Some(id) = engine.record().transport_id().cloned() else {
                continue;
            };
            actions.push(Action::Notify(ProximityEvent::ConnectRequested {
                transport_id: id.clone(),
            }));
            actions.push(Action::Connect(id.clone()));
            self.in_flight.insert(id);
        }
        self.rescan_due = Some(now + self.config.rescan_interval);
        self.phase = Phase::Connecting;
        debug!(pending = self.in_flight.len(), "Connect phase started");
    }

    fn rescan(&mut self, now: Instant, actions: &mut Vec<Action>) {
        self.rescan_due = None;
        let abandoned = self.in_flight.len();
        self.disconnect_connecting(actions);
        self.in_flight.clear();

        self.phase = Phase::Scanning;
        actions.push(Action::StartScan);
        self.report_due = Some(now + self.config.report_interval);
        self.connect_due = Some(now + self.config.connect_poll_interval);
        if abandoned > 0 {
            warn!(abandoned, "Rescan abandoned outstanding connects");
        } else {
            debug!("Scanning resumed");
        }
        actions.push(Action::Notify(ProximityEvent::ScanRestarted { abandoned }));
    }

    fn report(&mut self, now: Instant, actions: &mut Vec<Action>) {
        self.report_due = Some(now + self.config.report_interval);
        let reportable = self
            .devices
            .select(|r| r.is_identified() && r.is_discovered());
        let mut immediate: Vec<DeviceView> = Vec::new();
        for key in reportable {
            let Some(engine) = self.devices.get_mut(key) else {
                continue;
            };
            engine.check_staleness(now);
            if engine.recompute_proximity_tier().is_immediate() {
                immediate.push(engine.record().view());
            }
        }
        debug!(immediate = immediate.len(), "Report tick");
        actions.push(Action::Notify(ProximityEvent::Report(ProximityReport::now(
            immediate,
        ))));
    }

    fn identify(&mut self, key: DeviceKey, payload: IdentityPayload, actions: &mut Vec<Action>) {
        let identity = match self.devices.get(key) {
            Some(engine) => engine.record().identity(),
            None => return,
        };
        self.devices
            .assign_identity(key, payload.user_id, payload.user_name.clone());
        info!(%identity, user_id = payload.user_id, user_name = %payload.user_name, "Device identified");
        actions.push(Action::Notify(ProximityEvent::Identified {
            identity,
            user_id: payload.user_id,
            user_name: payload.user_name,
        }));
    }

    fn reject(&self, transport_id: &TransportId, reason: impl fmt::Display, actions: &mut Vec<Action>) {
        warn!(%transport_id, %reason, "Identity rejected");
        actions.push(Action::Notify(ProximityEvent::IdentityRejected {
            transport_id: transport_id.clone(),
            reason: reason.to_string(),
        }));
    }

    /// Run rescan recovery now if the connect phase has nothing left to wait for.
    ///
    /// Records whose connect failed may still hold a handle; they are
    /// disconnected by the rescan and retried on the next connect cycle.
    fn resume_if_settled(&mut self, now: Instant, actions: &mut Vec<Action>) {
        if self.in_flight.is_empty() && self.rescan_due.is_some() {
            debug!(
                live_transports = self.devices.has_live_transports(),
                "All connects resolved, resuming discovery early"
            );
            self.rescan(now, actions);
        }
    }

    fn disconnect_connecting(&self, actions: &mut Vec<Action>) {
        for record in self.devices.records() {
            if record.state() != LifecycleState::Connecting {
                continue;
            }
            if let Some(id) = record.transport_id() {
                actions.push(Action::Disconnect(id.clone()));
            }
        }
    }
}

fn is_due(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|at| at <= now)
}
