//! Async driver for the coordinator.
//!
//! [`ScanCoordinator`] runs a [`CoordinatorCore`] on a single tokio task.
//! Discovery events, radio completions, application commands and the
//! earliest cycle deadline are multiplexed with `tokio::select!`, so every
//! mutation of the device set happens on that one task.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nearby_core::{BtleOptions, BtleRadio, ScanCoordinator, ScannerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let radio = Arc::new(BtleRadio::new(BtleOptions::default()).await?);
//!     let mut coordinator = ScanCoordinator::new(radio, ScannerConfig::default())
//!         .on_immediate_devices(|devices| {
//!             for device in devices {
//!                 println!("{} is nearby", device.user_name);
//!             }
//!         });
//!     coordinator.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     coordinator.stop().await;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nearby_types::{DeviceView, KnownDevice, TransportId};

use crate::config::ScannerConfig;
use crate::coordinator::{Action, CoordinatorCore};
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, ProximityEvent};
use crate::radio::{DiscoveryStream, Radio};
use crate::record::DeviceRecord;

/// Callback invoked with the Immediate devices on every report tick.
pub type ImmediateCallback = Arc<dyn Fn(&[DeviceView]) + Send + Sync>;

enum Command {
    Configure(Vec<KnownDevice>),
    Snapshot(oneshot::Sender<Vec<DeviceRecord>>),
}

enum Completion {
    Identity {
        id: TransportId,
        result: Result<Bytes>,
    },
    ConnectFailed {
        id: TransportId,
        error: Error,
    },
}

struct Running {
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the device set and drives discovery, connect and report cycles.
pub struct ScanCoordinator<R: Radio> {
    radio: Arc<R>,
    config: ScannerConfig,
    roster: Vec<KnownDevice>,
    events: EventDispatcher,
    on_immediate: Option<ImmediateCallback>,
    running: Option<Running>,
}

impl<R: Radio> std::fmt::Debug for ScanCoordinator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("config", &self.config)
            .field("roster", &self.roster.len())
            .field("running", &self.running.is_some())
            .finish_non_exhaustive()
    }
}

impl<R: Radio> ScanCoordinator<R> {
    /// Create a stopped coordinator.
    pub fn new(radio: Arc<R>, config: ScannerConfig) -> Self {
        let events = EventDispatcher::new(config.event_capacity.max(1));
        Self {
            radio,
            config,
            roster: Vec::new(),
            events,
            on_immediate: None,
            running: None,
        }
    }

    /// Register the report callback.
    #[must_use]
    pub fn on_immediate_devices<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[DeviceView]) + Send + Sync + 'static,
    {
        self.on_immediate = Some(Arc::new(callback));
        self
    }

    /// Subscribe to coordinator events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// The active configuration.
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Whether the coordinator task is running.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Seed the device set with known devices, merged by identity key.
    ///
    /// The roster is kept and re-applied on every `start()`.
    pub async fn configure(&mut self, roster: Vec<KnownDevice>) {
        if let Some(running) = &self.running
            && running
                .commands
                .send(Command::Configure(roster.clone()))
                .await
                .is_err()
        {
            debug!("Coordinator task gone, roster applies on next start");
        }
        self.roster = roster;
    }

    /// Begin discovery and arm the cycles. Idempotent.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            debug!("Coordinator already running");
            return Ok(());
        }
        self.config.validate()?;

        let discoveries = self.radio.discoveries(self.config.service_uuid).await?;
        let cancel = CancellationToken::new();
        let (commands, command_rx) = mpsc::channel(16);

        let driver = Driver {
            radio: Arc::clone(&self.radio),
            config: self.config.clone(),
            events: self.events.clone(),
            on_immediate: self.on_immediate.clone(),
            cancel: cancel.clone(),
            pending: HashMap::new(),
        };
        let core = CoordinatorCore::new(self.config.clone());
        let roster = self.roster.clone();
        let handle = tokio::spawn(driver.run(core, roster, discoveries, command_rx));

        self.running = Some(Running {
            commands,
            cancel,
            handle,
        });
        info!("Coordinator started");
        Ok(())
    }

    /// Disarm every cycle and release the radio session.
    ///
    /// Connects still in flight are cancelled and their results discarded.
    /// Safe to call when not started.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            warn!("Coordinator task ended abnormally: {}", e);
        }
        info!("Coordinator stopped");
    }

    /// Clone every tracked record. Empty when not running.
    pub async fn snapshot(&self) -> Vec<DeviceRecord> {
        let Some(running) = &self.running else {
            return Vec::new();
        };
        let (tx, rx) = oneshot::channel();
        if running.commands.send(Command::Snapshot(tx)).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}

impl<R: Radio> Drop for ScanCoordinator<R> {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

struct Driver<R: Radio> {
    radio: Arc<R>,
    config: ScannerConfig,
    events: EventDispatcher,
    on_immediate: Option<ImmediateCallback>,
    cancel: CancellationToken,
    /// Cancellation handles for connects that have not completed.
    pending: HashMap<TransportId, CancellationToken>,
}

impl<R: Radio> Driver<R> {
    async fn run(
        mut self,
        mut core: CoordinatorCore,
        roster: Vec<KnownDevice>,
        discoveries: DiscoveryStream,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut discoveries = discoveries.fuse();

        let seeded = core.configure(&roster, now());
        self.execute(seeded, &done_tx).await;
        let started = core.start(now());
        self.execute(started, &done_tx).await;

        loop {
            let deadline = core.next_deadline();
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let actions = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,
                Some(command) = commands.recv() => match command {
                    Command::Configure(roster) => core.configure(&roster, now()),
                    Command::Snapshot(reply) => {
                        let _ = reply.send(core.snapshot());
                        Vec::new()
                    }
                },
                Some(completion) = done_rx.recv() => match completion {
                    Completion::Identity { id, result } => {
                        self.pending.remove(&id);
                        core.on_identity(&id, result, now())
                    }
                    Completion::ConnectFailed { id, error } => {
                        self.pending.remove(&id);
                        core.on_connect_failed(&id, error, now())
                    }
                },
                _ = timer => core.tick(now()),
                Some(discovery) = discoveries.next() => core.on_discovery(&discovery, now()),
            };
            self.execute(actions, &done_tx).await;
        }

        let actions = core.stop();
        self.execute(actions, &done_tx).await;
        debug!(devices = core.devices().len(), "Coordinator loop exited");
    }

    async fn execute(&mut self, actions: Vec<Action>, done: &mpsc::UnboundedSender<Completion>) {
        for action in actions {
            match action {
                Action::StartScan => {
                    if let Err(e) = self.radio.start_scan(self.config.service_uuid).await {
                        warn!("Failed to start scan: {}", e);
                    }
                }
                Action::StopScan => {
                    if let Err(e) = self.radio.stop_scan().await {
                        warn!("Failed to stop scan: {}", e);
                    }
                }
                Action::Connect(id) => self.spawn_connect(id, done.clone()),
                Action::Disconnect(id) => {
                    if let Some(token) = self.pending.remove(&id) {
                        token.cancel();
                    }
                    let radio = Arc::clone(&self.radio);
                    tokio::spawn(async move {
                        if let Err(e) = radio.disconnect(&id).await {
                            debug!(%id, "Disconnect failed: {}", e);
                        }
                    });
                }
                Action::Notify(event) => {
                    if let (ProximityEvent::Report(report), Some(callback)) =
                        (&event, &self.on_immediate)
                    {
                        callback(&report.immediate);
                    }
                    self.events.send(event);
                }
            }
        }
    }

    fn spawn_connect(&mut self, id: TransportId, done: mpsc::UnboundedSender<Completion>) {
        let token = self.cancel.child_token();
        if let Some(previous) = self.pending.insert(id.clone(), token.clone()) {
            previous.cancel();
        }
        let radio = Arc::clone(&self.radio);
        let service = self.config.service_uuid;
        let characteristic = self.config.identity_characteristic;

        tokio::spawn(async move {
            let attempt = async {
                if let Err(error) = radio.connect(&id).await {
                    return Completion::ConnectFailed {
                        id: id.clone(),
                        error,
                    };
                }
                let result = radio.read_identity(&id, service, characteristic).await;
                Completion::Identity {
                    id: id.clone(),
                    result,
                }
            };
            let completion = tokio::select! {
                _ = token.cancelled() => {
                    debug!(%id, "Connect cancelled");
                    return;
                }
                completion = attempt => completion,
            };
            // Receiver is gone once the coordinator stops.
            let _ = done.send(completion);
        });
    }
}
