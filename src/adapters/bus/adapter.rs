//! Bus adapter - actor owning the broker link and the subscription set.
//!
//! ```text
//! ┌────────────────┐  BusCommand   ┌───────────────────────────┐   BusLink   ┌────────┐
//! │ BusAdapter     │──────────────►│ BusActor                  │◄───────────►│ broker │
//! │ (DeviceBus)    │◄──oneshot─────│  devices: BTreeSet        │             └────────┘
//! └────────────────┘               │  state: watch             │
//!                                  └─────────────┬─────────────┘
//!                                                │ InboundMessage (unbounded)
//!                                                ▼
//!                                           DeviceFeed
//! ```
//!
//! The actor is the only owner of the link. After a link loss it waits the
//! configured backoff, opens a fresh link and resubscribes every device it
//! still holds. Requests that arrive while the link is down are rejected
//! with [`BusError::NotConnected`]; nothing is queued for later.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::bus::{BusError, ConnectionState, Topic, TopicKind};
use crate::domain::foundation::DeviceId;
use crate::ports::{BusLink, BusTransport, DeviceBus, InboundMessage, RawMessage};

/// Tuning for the bus adapter.
#[derive(Debug, Clone)]
pub struct BusAdapterConfig {
    /// Fixed delay between reconnection attempts.
    pub reconnect_backoff: Duration,
    /// Also subscribe `devices/{id}/status` for each device.
    pub subscribe_status: bool,
    /// Capacity of the request channel into the actor.
    pub command_buffer: usize,
}

impl Default for BusAdapterConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_secs(2),
            subscribe_status: true,
            command_buffer: 64,
        }
    }
}

type Reply = oneshot::Sender<Result<(), BusError>>;

enum BusCommand {
    Subscribe { device: DeviceId, reply: Reply },
    Unsubscribe { device: DeviceId, reply: Reply },
    Publish { device: DeviceId, text: String, reply: Reply },
}

impl BusCommand {
    fn reject(self, error: BusError) {
        let reply = match self {
            BusCommand::Subscribe { reply, .. }
            | BusCommand::Unsubscribe { reply, .. }
            | BusCommand::Publish { reply, .. } => reply,
        };
        let _ = reply.send(Err(error));
    }
}

enum ActorSlot {
    Idle(BusActor),
    Running(JoinHandle<()>),
    Stopped,
}

struct Inner {
    commands: mpsc::Sender<BusCommand>,
    state: Arc<watch::Sender<ConnectionState>>,
    slot: Mutex<ActorSlot>,
    shutdown: CancellationToken,
    endpoint: String,
}

/// Handle to the process-wide bus connection. Cheap to clone.
#[derive(Clone)]
pub struct BusAdapter {
    inner: Arc<Inner>,
}

impl BusAdapter {
    /// Builds the adapter and the receiver of inbound device messages.
    ///
    /// Nothing touches the network until [`connect`](Self::connect).
    pub fn new(
        transport: Arc<dyn BusTransport>,
        config: BusAdapterConfig,
    ) -> (Self, mpsc::UnboundedReceiver<InboundMessage>) {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer.max(1));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let state = Arc::new(state);
        let shutdown = CancellationToken::new();
        let endpoint = transport.endpoint();

        let actor = BusActor {
            transport,
            config,
            commands: commands_rx,
            inbound: inbound_tx,
            state: Arc::clone(&state),
            shutdown: shutdown.clone(),
            devices: BTreeSet::new(),
        };

        let adapter = Self {
            inner: Arc::new(Inner {
                commands: commands_tx,
                state,
                slot: Mutex::new(ActorSlot::Idle(actor)),
                shutdown,
                endpoint,
            }),
        };
        (adapter, inbound_rx)
    }

    /// Starts the connection actor. Calling it again is a no-op.
    pub async fn connect(&self) {
        let mut slot = self.inner.slot.lock().await;
        *slot = match std::mem::replace(&mut *slot, ActorSlot::Stopped) {
            ActorSlot::Idle(actor) => {
                self.inner.state.send_replace(ConnectionState::Connecting);
                tracing::info!(endpoint = %self.inner.endpoint, "Connecting to broker");
                ActorSlot::Running(tokio::spawn(actor.run()))
            }
            other => other,
        };
    }

    /// Stops the actor and releases the link. Later calls fail with `NotConnected`.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let previous = {
            let mut slot = self.inner.slot.lock().await;
            std::mem::replace(&mut *slot, ActorSlot::Stopped)
        };
        if let ActorSlot::Running(handle) = previous {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Bus actor terminated abnormally");
            }
        }
        self.inner.state.send_replace(ConnectionState::Disconnected);
        tracing::info!(endpoint = %self.inner.endpoint, "Bus adapter shut down");
    }

    /// Broker endpoint, without credentials.
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    fn ensure_connected(&self) -> Result<(), BusError> {
        if self.inner.state.borrow().is_connected() {
            Ok(())
        } else {
            Err(BusError::NotConnected)
        }
    }

    async fn request(&self, build: impl FnOnce(Reply) -> BusCommand) -> Result<(), BusError> {
        let (reply, response) = oneshot::channel();
        self.inner
            .commands
            .send(build(reply))
            .await
            .map_err(|_| BusError::NotConnected)?;
        response.await.unwrap_or(Err(BusError::NotConnected))
    }
}

#[async_trait]
impl DeviceBus for BusAdapter {
    async fn subscribe(&self, device: &DeviceId) -> Result<(), BusError> {
        self.ensure_connected()?;
        self.request(|reply| BusCommand::Subscribe {
            device: device.clone(),
            reply,
        })
        .await
    }

    async fn unsubscribe(&self, device: &DeviceId) -> Result<(), BusError> {
        // Forwarded while reconnecting so the actor forgets the device.
        if *self.inner.state.borrow() == ConnectionState::Disconnected {
            return Err(BusError::NotConnected);
        }
        self.request(|reply| BusCommand::Unsubscribe {
            device: device.clone(),
            reply,
        })
        .await
    }

    async fn publish_command(&self, device: &DeviceId, command: &str) -> Result<(), BusError> {
        self.ensure_connected()?;
        self.request(|reply| BusCommand::Publish {
            device: device.clone(),
            text: command.to_string(),
            reply,
        })
        .await
    }

    fn connection_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }
}

enum LinkEnd {
    Lost,
    Shutdown,
}

struct BusActor {
    transport: Arc<dyn BusTransport>,
    config: BusAdapterConfig,
    commands: mpsc::Receiver<BusCommand>,
    inbound: mpsc::UnboundedSender<InboundMessage>,
    state: Arc<watch::Sender<ConnectionState>>,
    shutdown: CancellationToken,
    devices: BTreeSet<DeviceId>,
}

impl BusActor {
    async fn run(mut self) {
        let mut first_attempt = true;

        loop {
            if !first_attempt {
                self.set_state(ConnectionState::Reconnecting);
                if !self.wait_backoff().await {
                    break;
                }
            }
            first_attempt = false;

            let Some(mut link) = self.establish().await else {
                break;
            };
            self.set_state(ConnectionState::Connected);

            match self.pump(link.as_mut()).await {
                LinkEnd::Shutdown => break,
                LinkEnd::Lost => {
                    tracing::warn!(
                        devices = self.devices.len(),
                        "Broker link lost, reconnecting"
                    );
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            command.reject(BusError::NotConnected);
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::info!(from = %previous, to = %next, "Bus connection state changed");
        }
    }

    /// Opens a link and restores subscriptions, retrying until it succeeds.
    /// Returns `None` on shutdown.
    async fn establish(&mut self) -> Option<Box<dyn BusLink>> {
        loop {
            match self.open_link().await? {
                Ok(mut link) => match self.resubscribe(link.as_mut()).await {
                    Ok(()) => return Some(link),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to restore subscriptions");
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        backoff_ms = self.config.reconnect_backoff.as_millis() as u64,
                        "Broker connection attempt failed"
                    );
                }
            }

            // State stays Connecting (first attempt) or Reconnecting meanwhile.
            if !self.wait_backoff().await {
                return None;
            }
        }
    }

    /// One open attempt. Requests arriving meanwhile are rejected.
    async fn open_link(&mut self) -> Option<Result<Box<dyn BusLink>, BusError>> {
        let transport = Arc::clone(&self.transport);
        let open = transport.open();
        tokio::pin!(open);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return None,
                Some(command) = self.commands.recv() => self.reject_while_down(command),
                result = &mut open => return Some(result),
            }
        }
    }

    /// Sleeps the backoff while rejecting requests. Returns `false` on shutdown.
    async fn wait_backoff(&mut self) -> bool {
        let sleep = tokio::time::sleep(self.config.reconnect_backoff);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return false,
                Some(command) = self.commands.recv() => self.reject_while_down(command),
                _ = &mut sleep => return true,
            }
        }
    }

    fn reject_while_down(&mut self, command: BusCommand) {
        if let BusCommand::Unsubscribe { device, reply } = command {
            if self.devices.remove(&device) {
                tracing::debug!(device_id = %device, "Forgot device while link is down");
            }
            let _ = reply.send(Err(BusError::NotConnected));
        } else {
            command.reject(BusError::NotConnected);
        }
    }

    async fn resubscribe(&self, link: &mut dyn BusLink) -> Result<(), BusError> {
        for device in &self.devices {
            self.subscribe_topics(link, device).await?;
        }
        if !self.devices.is_empty() {
            tracing::info!(devices = self.devices.len(), "Restored device subscriptions");
        }
        Ok(())
    }

    async fn pump(&mut self, link: &mut dyn BusLink) -> LinkEnd {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return LinkEnd::Shutdown,
                Some(command) = self.commands.recv() => self.execute(link, command).await,
                message = link.next_message() => match message {
                    Some(message) => self.dispatch(message),
                    None => return LinkEnd::Lost,
                },
            }
        }
    }

    async fn execute(&mut self, link: &mut dyn BusLink, command: BusCommand) {
        match command {
            BusCommand::Subscribe { device, reply } => {
                let result = if self.devices.contains(&device) {
                    Ok(())
                } else {
                    let result = self.subscribe_topics(link, &device).await;
                    if result.is_ok() {
                        tracing::info!(device_id = %device, "Subscribed to device");
                        self.devices.insert(device);
                    }
                    result
                };
                let _ = reply.send(result);
            }
            BusCommand::Unsubscribe { device, reply } => {
                let result = if self.devices.remove(&device) {
                    let result = self.unsubscribe_topics(link, &device).await;
                    tracing::info!(device_id = %device, ok = result.is_ok(), "Unsubscribed from device");
                    result
                } else {
                    Ok(())
                };
                let _ = reply.send(result);
            }
            BusCommand::Publish {
                device,
                text,
                reply,
            } => {
                let topic = Topic::command(&device).to_string();
                let result = link.publish(&topic, &text).await;
                match &result {
                    Ok(()) => tracing::debug!(topic = %topic, command = %text, "Published command"),
                    Err(e) => tracing::warn!(topic = %topic, error = %e, "Publish failed"),
                }
                let _ = reply.send(result);
            }
        }
    }

    async fn subscribe_topics(
        &self,
        link: &mut dyn BusLink,
        device: &DeviceId,
    ) -> Result<(), BusError> {
        let data = Topic::data(device).to_string();
        link.subscribe(&data).await?;

        if self.config.subscribe_status {
            let status = Topic::status(device).to_string();
            if let Err(e) = link.subscribe(&status).await {
                let _ = link.unsubscribe(&data).await;
                return Err(e);
            }
        }
        Ok(())
    }

    async fn unsubscribe_topics(
        &self,
        link: &mut dyn BusLink,
        device: &DeviceId,
    ) -> Result<(), BusError> {
        let data = link.unsubscribe(&Topic::data(device).to_string()).await;
        let status = if self.config.subscribe_status {
            link.unsubscribe(&Topic::status(device).to_string()).await
        } else {
            Ok(())
        };
        data.and(status)
    }

    fn dispatch(&self, message: RawMessage) {
        let Some(topic) = Topic::parse(&message.topic) else {
            tracing::debug!(topic = %message.topic, "Ignoring message on foreign channel");
            return;
        };
        if topic.kind() == TopicKind::Command {
            return;
        }
        let inbound = InboundMessage {
            device: topic.device().clone(),
            kind: topic.kind(),
            payload: message.payload,
        };
        if self.inbound.send(inbound).is_err() {
            tracing::debug!(topic = %message.topic, "Inbound receiver dropped");
        }
    }
}
