//! Session gateway: one actor per connected viewer.
//!
//! # Architecture
//!
//! ```text
//!                  SessionRequest                      Notification
//! transport ───────────────────────► ViewerSession ───────────────────► transport
//!                                     │   ▲    ▲  ▲
//!                 join/leave/leave_all│   │    │  └── bus state (watch)
//!                                     ▼   │    └───── SweepEvent (SweepController)
//!                                  RoomRouter ─────── RoomDelivery (bounded mailbox)
//! ```
//!
//! A session owns its aggregators (one per device it has joined, kept for
//! its whole lifetime), its sweep controller and its room memberships. All
//! of that state is touched only from the session's own task.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::domain::bus::{BusError, ConnectionState, DeviceCommand};
use crate::domain::foundation::{DeviceId, ErrorCode, SweepId, Timestamp, ViewerId};
use crate::domain::series::{AggregateUpdate, SeriesAggregator, SeriesSnapshot};
use crate::domain::sweep::{SweepRequest, SweepStatus};
use crate::ports::DeviceBus;

use super::rooms::{DeviceUpdate, LeaveOutcome, RoomDelivery, RoomRouter, SessionHandle};
use super::sweep::{SweepController, SweepEvent};

/// Channel sizing for viewer sessions.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Capacity of each session's room mailbox. Overflow is dropped.
    pub session_buffer: usize,
    /// Capacity of each session's outbound notification channel.
    pub outbound_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            session_buffer: 256,
            outbound_buffer: 256,
        }
    }
}

/// A request from a viewer. Device ids arrive unvalidated.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionRequest {
    JoinDevice { device_id: String },
    LeaveDevice { device_id: String },
    SendCommand { device_id: String, command: String },
    StartSweep(SweepRequest),
    AbortSweep,
    /// Full series the session holds for one device.
    RequestState { device_id: String },
    Ping,
    /// A frame the transport could not decode.
    Invalid { reason: String },
}

/// Result reported in a command acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    Sent,
    Failed,
}

/// Something a viewer is told.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Connected {
        viewer_id: ViewerId,
        bus_state: ConnectionState,
        timestamp: Timestamp,
    },
    DataUpdate {
        device: DeviceId,
        update: AggregateUpdate,
    },
    StatusChanged {
        text: String,
        device: Option<DeviceId>,
        bus_state: Option<ConnectionState>,
    },
    ErrorOccurred {
        code: ErrorCode,
        message: String,
        device: Option<DeviceId>,
    },
    CommandAck {
        device: DeviceId,
        command: String,
        outcome: CommandOutcome,
        reason: Option<String>,
    },
    SweepStatus {
        sweep_id: SweepId,
        device: DeviceId,
        status: SweepStatus,
        current_frequency: Option<f64>,
    },
    SeriesSnapshot {
        device: DeviceId,
        series: SeriesSnapshot,
    },
    Pong,
}

impl Notification {
    fn error(code: ErrorCode, message: impl Into<String>, device: Option<DeviceId>) -> Self {
        Notification::ErrorOccurred {
            code,
            message: message.into(),
            device,
        }
    }

    fn device_status(device: &DeviceId, text: String) -> Self {
        Notification::StatusChanged {
            text,
            device: Some(device.clone()),
            bus_state: None,
        }
    }
}

/// Transport-side ends of a viewer session.
pub struct SessionChannels {
    pub viewer_id: ViewerId,
    /// Dropping this closes the session.
    pub requests: mpsc::Sender<SessionRequest>,
    pub notifications: mpsc::Receiver<Notification>,
}

/// Spawns and tracks viewer sessions.
pub struct SessionGateway {
    rooms: Arc<RoomRouter>,
    bus: Arc<dyn DeviceBus>,
    config: GatewayConfig,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl SessionGateway {
    pub fn new(rooms: Arc<RoomRouter>, bus: Arc<dyn DeviceBus>, config: GatewayConfig) -> Self {
        Self {
            rooms,
            bus,
            config,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Start a session actor and hand back its channels.
    pub fn open_session(&self) -> SessionChannels {
        let viewer_id = ViewerId::new();
        let (requests_tx, requests_rx) = mpsc::channel(self.config.session_buffer.max(1));
        let (notifications_tx, notifications_rx) =
            mpsc::channel(self.config.outbound_buffer.max(1));
        let (mailbox, deliveries) = mpsc::channel(self.config.session_buffer.max(1));
        let (sweep_tx, sweep_events) = mpsc::unbounded_channel();

        let session = ViewerSession {
            id: viewer_id,
            rooms: Arc::clone(&self.rooms),
            bus: Arc::clone(&self.bus),
            mailbox,
            deliveries,
            requests: requests_rx,
            notifications: notifications_tx,
            sweeps: SweepController::new(Arc::clone(&self.bus), sweep_tx),
            sweep_events,
            series: HashMap::new(),
            joined: HashSet::new(),
            bus_state: self.bus.watch_state(),
            shutdown: self.shutdown.child_token(),
            closing: false,
        };

        tracing::info!(viewer_id = %viewer_id, "Viewer session opened");
        self.tracker.spawn(session.run());

        SessionChannels {
            viewer_id,
            requests: requests_tx,
            notifications: notifications_rx,
        }
    }

    /// Number of live sessions.
    pub fn active_sessions(&self) -> usize {
        self.tracker.len()
    }

    pub fn rooms(&self) -> &Arc<RoomRouter> {
        &self.rooms
    }

    /// Close every session: running sweeps are aborted (and report it),
    /// then each session leaves its rooms.
    pub async fn shutdown(&self) {
        tracing::info!(sessions = self.tracker.len(), "Shutting down viewer sessions");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

struct ViewerSession {
    id: ViewerId,
    rooms: Arc<RoomRouter>,
    bus: Arc<dyn DeviceBus>,
    mailbox: mpsc::Sender<RoomDelivery>,
    deliveries: mpsc::Receiver<RoomDelivery>,
    requests: mpsc::Receiver<SessionRequest>,
    notifications: mpsc::Sender<Notification>,
    sweeps: SweepController,
    sweep_events: mpsc::UnboundedReceiver<SweepEvent>,
    series: HashMap<DeviceId, SeriesAggregator>,
    /// Devices whose room this session is in. Deliveries for other devices
    /// are stale leftovers in the mailbox and are dropped.
    joined: HashSet<DeviceId>,
    bus_state: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
    closing: bool,
}

impl ViewerSession {
    async fn run(mut self) {
        let bus_state = *self.bus_state.borrow_and_update();
        self.notify(Notification::Connected {
            viewer_id: self.id,
            bus_state,
            timestamp: Timestamp::now(),
        })
        .await;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
                Some(event) = self.sweep_events.recv() => self.handle_sweep_event(event).await,
                Some(delivery) = self.deliveries.recv() => self.handle_delivery(delivery).await,
                Ok(()) = self.bus_state.changed() => self.handle_bus_state().await,
            }
        }

        self.close().await;
    }

    async fn notify(&self, notification: Notification) {
        if self.closing {
            if self.notifications.try_send(notification).is_err() {
                tracing::debug!(viewer_id = %self.id, "Dropped notification while closing");
            }
            return;
        }
        tokio::select! {
            biased;
            result = self.notifications.send(notification) => {
                if result.is_err() {
                    tracing::debug!(viewer_id = %self.id, "Notification channel closed");
                }
            }
            _ = self.shutdown.cancelled() => {}
        }
    }

    async fn handle_request(&mut self, request: SessionRequest) {
        match request {
            SessionRequest::JoinDevice { device_id } => self.join(&device_id).await,
            SessionRequest::LeaveDevice { device_id } => self.leave(&device_id).await,
            SessionRequest::SendCommand { device_id, command } => {
                self.send_command(&device_id, &command).await
            }
            SessionRequest::StartSweep(request) => self.start_sweep(request).await,
            SessionRequest::AbortSweep => {
                if let Err(e) = self.sweeps.abort_active() {
                    self.notify(Notification::error(e.code(), e.to_string(), None))
                        .await;
                }
            }
            SessionRequest::RequestState { device_id } => self.send_snapshot(&device_id).await,
            SessionRequest::Ping => self.notify(Notification::Pong).await,
            SessionRequest::Invalid { reason } => {
                tracing::debug!(viewer_id = %self.id, reason = %reason, "Invalid request");
                self.notify(Notification::error(ErrorCode::InvalidRequest, reason, None))
                    .await;
            }
        }
    }

    async fn parse_device(&self, raw: &str) -> Option<DeviceId> {
        match DeviceId::new(raw.trim()) {
            Ok(device) => Some(device),
            Err(e) => {
                self.notify(Notification::error(ErrorCode::InvalidDevice, e.to_string(), None))
                    .await;
                None
            }
        }
    }

    async fn join(&mut self, raw: &str) {
        let Some(device) = self.parse_device(raw).await else {
            return;
        };
        let handle = SessionHandle {
            id: self.id,
            mailbox: self.mailbox.clone(),
        };
        match self.rooms.join(&device, handle).await {
            Ok(outcome) => {
                tracing::debug!(viewer_id = %self.id, device_id = %device, ?outcome, "Join handled");
                self.series.entry(device.clone()).or_default();
                self.joined.insert(device.clone());
                self.notify(Notification::device_status(&device, format!("Joined device {device}")))
                    .await;
            }
            Err(e) => self.report_bus_error(&device, &e).await,
        }
    }

    async fn leave(&mut self, raw: &str) {
        let Some(device) = self.parse_device(raw).await else {
            return;
        };
        match self.rooms.leave(&device, &self.id).await {
            Ok(LeaveOutcome::NotMember) => {
                self.notify(Notification::error(
                    ErrorCode::NotJoined,
                    format!("Not joined to device {device}"),
                    Some(device),
                ))
                .await;
            }
            Ok(_) => {
                self.joined.remove(&device);
                self.notify(Notification::device_status(&device, format!("Left device {device}")))
                    .await;
            }
            Err(e) => {
                self.joined.remove(&device);
                self.notify(Notification::device_status(&device, format!("Left device {device}")))
                    .await;
                self.report_bus_error(&device, &e).await;
            }
        }
    }

    async fn send_command(&self, raw_device: &str, raw_command: &str) {
        let command = match DeviceCommand::new(raw_device, raw_command) {
            Ok(command) => command,
            Err(e) => {
                self.notify(Notification::error(e.code(), e.to_string(), None))
                    .await;
                return;
            }
        };

        let result = self
            .bus
            .publish_command(command.device(), command.text())
            .await;
        self.acknowledge(command.device(), command.text(), result)
            .await;
    }

    async fn acknowledge(&self, device: &DeviceId, command: &str, result: Result<(), BusError>) {
        match result {
            Ok(()) => {
                self.notify(Notification::CommandAck {
                    device: device.clone(),
                    command: command.to_string(),
                    outcome: CommandOutcome::Sent,
                    reason: None,
                })
                .await;
            }
            Err(e) => {
                self.notify(Notification::CommandAck {
                    device: device.clone(),
                    command: command.to_string(),
                    outcome: CommandOutcome::Failed,
                    reason: Some(e.to_string()),
                })
                .await;
                self.report_bus_error(device, &e).await;
            }
        }
    }

    async fn start_sweep(&mut self, request: SweepRequest) {
        let device = DeviceId::new(request.device_id.trim()).ok();
        match self.sweeps.start(request) {
            Ok(sweep_id) => {
                if let Some(state) = self.sweeps.state() {
                    self.notify(Notification::SweepStatus {
                        sweep_id,
                        device: state.device_id,
                        status: SweepStatus::Running,
                        current_frequency: None,
                    })
                    .await;
                }
            }
            Err(e) => {
                self.notify(Notification::error(e.code(), e.to_string(), device))
                    .await;
            }
        }
    }

    async fn send_snapshot(&self, raw: &str) {
        let Some(device) = self.parse_device(raw).await else {
            return;
        };
        match self.series.get(&device) {
            Some(aggregator) => {
                let series = aggregator.snapshot();
                self.notify(Notification::SeriesSnapshot { device, series })
                    .await;
            }
            None => {
                self.notify(Notification::error(
                    ErrorCode::NotJoined,
                    format!("No series for device {device}"),
                    Some(device),
                ))
                .await;
            }
        }
    }

    async fn report_bus_error(&self, device: &DeviceId, error: &BusError) {
        tracing::warn!(viewer_id = %self.id, device_id = %device, error = %error, "Bus request failed");
        self.notify(Notification::error(
            error.code(),
            error.to_string(),
            Some(device.clone()),
        ))
        .await;
    }

    async fn handle_delivery(&mut self, delivery: RoomDelivery) {
        let RoomDelivery { device, update } = delivery;
        if !self.joined.contains(&device) {
            tracing::debug!(viewer_id = %self.id, device_id = %device, "Dropping delivery for a left device");
            return;
        }
        match update {
            DeviceUpdate::Sample(sample) => {
                let Some(aggregator) = self.series.get_mut(&device) else {
                    return;
                };
                let update = aggregator.ingest(sample);
                self.notify(Notification::DataUpdate { device, update }).await;
            }
            DeviceUpdate::Malformed(e) => {
                self.notify(Notification::error(e.code(), e.to_string(), Some(device)))
                    .await;
            }
            DeviceUpdate::Status(text) => {
                self.notify(Notification::device_status(&device, text)).await;
            }
        }
    }

    async fn handle_sweep_event(&self, event: SweepEvent) {
        match event {
            SweepEvent::CommandSent {
                sweep_id,
                device,
                frequency,
                command,
                result,
            } => {
                self.acknowledge(&device, &command, result).await;
                self.notify(Notification::SweepStatus {
                    sweep_id,
                    device,
                    status: SweepStatus::Running,
                    current_frequency: Some(frequency),
                })
                .await;
            }
            SweepEvent::Finished {
                sweep_id,
                device,
                status,
            } => {
                let current_frequency = self
                    .sweeps
                    .state()
                    .filter(|state| state.sweep_id == sweep_id)
                    .and_then(|state| state.current_frequency);
                self.notify(Notification::SweepStatus {
                    sweep_id,
                    device,
                    status,
                    current_frequency,
                })
                .await;
            }
        }
    }

    async fn handle_bus_state(&mut self) {
        let state = *self.bus_state.borrow_and_update();
        self.notify(Notification::StatusChanged {
            text: format!("Bus {state}"),
            device: None,
            bus_state: Some(state),
        })
        .await;
    }

    async fn close(mut self) {
        self.closing = true;
        self.sweeps.shutdown().await;
        while let Ok(event) = self.sweep_events.try_recv() {
            self.handle_sweep_event(event).await;
        }
        let left = self.rooms.leave_all(&self.id).await;
        tracing::info!(viewer_id = %self.id, devices = left.len(), "Viewer session closed");
    }
}
