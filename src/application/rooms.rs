//! Device rooms: which viewer sessions receive which device's traffic.
//!
//! # Architecture
//!
//! ```text
//! Room: D1             Room: D2
//! ├── viewer-a         ├── viewer-c
//! └── viewer-b         └── viewer-a
//! ```
//!
//! A message from D2 reaches viewers c and a only. A room exists exactly
//! while it has members, and the bus is subscribed to a device exactly
//! while its room exists. The subscribe/unsubscribe call happens under the
//! registry write lock, so concurrent joins and leaves for one device can
//! neither double-subscribe nor unsubscribe a room that just gained a member.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::domain::bus::BusError;
use crate::domain::foundation::{DeviceId, ViewerId};
use crate::domain::measurement::{ParseError, Sample};
use crate::ports::DeviceBus;

/// Payload routed to every session in a device room.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceUpdate {
    /// A decoded measurement.
    Sample(Sample),
    /// A data payload that failed to decode.
    Malformed(ParseError),
    /// Free-form text from the device's status topic.
    Status(String),
}

/// One update addressed to one session.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomDelivery {
    pub device: DeviceId,
    pub update: DeviceUpdate,
}

/// How a session is reached by the router.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: ViewerId,
    pub mailbox: mpsc::Sender<RoomDelivery>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// First member; the device was subscribed.
    Created,
    Joined,
    AlreadyMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    /// Last member left; the room was removed and the device unsubscribed.
    Closed,
    NotMember,
}

type Members = HashMap<ViewerId, mpsc::Sender<RoomDelivery>>;

/// Registry of device rooms, owning the room-driven subscription decisions.
///
/// # Thread Safety
///
/// Broadcasts take the read lock; joins and leaves take the write lock and
/// hold it across the bus call that accompanies a room being created or
/// removed.
pub struct RoomRouter {
    rooms: RwLock<HashMap<DeviceId, Members>>,
    bus: Arc<dyn DeviceBus>,
}

impl RoomRouter {
    pub fn new(bus: Arc<dyn DeviceBus>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// Register a session for a device.
    ///
    /// Subscribes the bus when the room is created. If that subscribe
    /// fails, no room is created and the error is returned.
    pub async fn join(
        &self,
        device: &DeviceId,
        session: SessionHandle,
    ) -> Result<JoinOutcome, BusError> {
        let mut rooms = self.rooms.write().await;

        if let Some(members) = rooms.get_mut(device) {
            if members.contains_key(&session.id) {
                return Ok(JoinOutcome::AlreadyMember);
            }
            members.insert(session.id, session.mailbox);
            tracing::debug!(device_id = %device, viewer_id = %session.id, "Joined room");
            return Ok(JoinOutcome::Joined);
        }

        self.bus.subscribe(device).await?;

        let mut members = Members::new();
        members.insert(session.id, session.mailbox);
        rooms.insert(device.clone(), members);
        tracing::info!(device_id = %device, viewer_id = %session.id, "Room created");
        Ok(JoinOutcome::Created)
    }

    /// Remove a session from a device room.
    ///
    /// When the room empties it is removed even if the unsubscribe fails;
    /// the failure is returned so the caller can report it.
    pub async fn leave(
        &self,
        device: &DeviceId,
        viewer: &ViewerId,
    ) -> Result<LeaveOutcome, BusError> {
        let mut rooms = self.rooms.write().await;

        let Some(members) = rooms.get_mut(device) else {
            return Ok(LeaveOutcome::NotMember);
        };
        if members.remove(viewer).is_none() {
            return Ok(LeaveOutcome::NotMember);
        }
        if !members.is_empty() {
            tracing::debug!(device_id = %device, viewer_id = %viewer, "Left room");
            return Ok(LeaveOutcome::Left);
        }

        rooms.remove(device);
        tracing::info!(device_id = %device, viewer_id = %viewer, "Room closed");
        self.bus.unsubscribe(device).await?;
        Ok(LeaveOutcome::Closed)
    }

    /// Remove a session from every room it belongs to.
    ///
    /// Returns the devices it was removed from. Unsubscribe failures are
    /// logged; the rooms are gone regardless.
    pub async fn leave_all(&self, viewer: &ViewerId) -> Vec<DeviceId> {
        let mut rooms = self.rooms.write().await;

        let joined: Vec<DeviceId> = rooms
            .iter()
            .filter(|(_, members)| members.contains_key(viewer))
            .map(|(device, _)| device.clone())
            .collect();

        for device in &joined {
            let now_empty = rooms
                .get_mut(device)
                .map(|members| {
                    members.remove(viewer);
                    members.is_empty()
                })
                .unwrap_or(false);

            if now_empty {
                rooms.remove(device);
                tracing::info!(device_id = %device, viewer_id = %viewer, "Room closed");
                if let Err(e) = self.bus.unsubscribe(device).await {
                    tracing::warn!(device_id = %device, error = %e, "Unsubscribe failed while closing room");
                }
            }
        }

        joined
    }

    /// Deliver an update to every session joined to `device`.
    ///
    /// Never blocks: a session whose mailbox is full misses this update.
    /// Returns how many sessions accepted it.
    pub async fn broadcast(&self, device: &DeviceId, update: DeviceUpdate) -> usize {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(device) else {
            return 0;
        };

        let mut delivered = 0;
        for (viewer, mailbox) in members {
            let delivery = RoomDelivery {
                device: device.clone(),
                update: update.clone(),
            };
            match mailbox.try_send(delivery) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(device_id = %device, viewer_id = %viewer, "Viewer mailbox full, dropping update");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(device_id = %device, viewer_id = %viewer, "Viewer mailbox closed");
                }
            }
        }
        delivered
    }

    /// Number of sessions in a device room (0 if it doesn't exist).
    pub async fn member_count(&self, device: &DeviceId) -> usize {
        self.rooms
            .read()
            .await
            .get(device)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Devices that currently have a room (for monitoring/debugging).
    pub async fn active_devices(&self) -> Vec<DeviceId> {
        self.rooms.read().await.keys().cloned().collect()
    }

    /// Whether a session is joined to a device.
    pub async fn is_member(&self, device: &DeviceId, viewer: &ViewerId) -> bool {
        self.rooms
            .read()
            .await
            .get(device)
            .is_some_and(|members| members.contains_key(viewer))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::bus::ConnectionState;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::watch;

    /// Records device-level bus calls; subscribe can be made to fail.
    pub(crate) struct RecordingBus {
        pub calls: Mutex<Vec<String>>,
        pub fail_subscribe: Mutex<bool>,
        state: watch::Sender<ConnectionState>,
    }

    impl RecordingBus {
        pub(crate) fn new() -> Arc<Self> {
            let (state, _) = watch::channel(ConnectionState::Connected);
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_subscribe: Mutex::new(false),
                state,
            })
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn set_state(&self, state: ConnectionState) {
            self.state.send_replace(state);
        }
    }

    #[async_trait]
    impl DeviceBus for RecordingBus {
        async fn subscribe(&self, device: &DeviceId) -> Result<(), BusError> {
            self.calls.lock().unwrap().push(format!("subscribe {device}"));
            if *self.fail_subscribe.lock().unwrap() {
                return Err(BusError::subscribe_failed(format!("devices/{device}/data"), "refused"));
            }
            Ok(())
        }

        async fn unsubscribe(&self, device: &DeviceId) -> Result<(), BusError> {
            self.calls.lock().unwrap().push(format!("unsubscribe {device}"));
            Ok(())
        }

        async fn publish_command(&self, device: &DeviceId, command: &str) -> Result<(), BusError> {
            self.calls.lock().unwrap().push(format!("publish {device} {command}"));
            Ok(())
        }

        fn connection_state(&self) -> ConnectionState {
            *self.state.borrow()
        }

        fn watch_state(&self) -> watch::Receiver<ConnectionState> {
            self.state.subscribe()
        }
    }

    fn device(id: &str) -> DeviceId {
        DeviceId::new(id).unwrap()
    }

    fn session(capacity: usize) -> (SessionHandle, mpsc::Receiver<RoomDelivery>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            SessionHandle {
                id: ViewerId::new(),
                mailbox: tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn subscribes_once_per_room_lifetime() {
        let bus = RecordingBus::new();
        let router = RoomRouter::new(bus.clone());
        let d1 = device("D1");
        let (a, _rx_a) = session(8);
        let (b, _rx_b) = session(8);
        let (c, _rx_c) = session(8);

        assert_eq!(router.join(&d1, a.clone()).await, Ok(JoinOutcome::Created));
        assert_eq!(router.join(&d1, b.clone()).await, Ok(JoinOutcome::Joined));
        assert_eq!(router.leave(&d1, &a.id).await, Ok(LeaveOutcome::Left));
        assert_eq!(router.leave(&d1, &b.id).await, Ok(LeaveOutcome::Closed));
        assert_eq!(router.join(&d1, c).await, Ok(JoinOutcome::Created));

        assert_eq!(
            bus.calls(),
            vec!["subscribe D1", "unsubscribe D1", "subscribe D1"]
        );
    }

    #[tokio::test]
    async fn rejoin_is_reported_and_not_resubscribed() {
        let bus = RecordingBus::new();
        let router = RoomRouter::new(bus.clone());
        let (a, _rx) = session(8);

        router.join(&device("D1"), a.clone()).await.unwrap();
        let outcome = router.join(&device("D1"), a).await.unwrap();

        assert_eq!(outcome, JoinOutcome::AlreadyMember);
        assert_eq!(bus.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_subscribe_creates_no_room() {
        let bus = RecordingBus::new();
        *bus.fail_subscribe.lock().unwrap() = true;
        let router = RoomRouter::new(bus.clone());
        let (a, _rx) = session(8);

        let result = router.join(&device("D1"), a).await;

        assert!(matches!(result, Err(BusError::SubscribeFailed { .. })));
        assert!(router.active_devices().await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_only_room_members() {
        let bus = RecordingBus::new();
        let router = RoomRouter::new(bus);
        let (a, mut rx_a) = session(8);
        let (b, mut rx_b) = session(8);

        router.join(&device("D1"), a).await.unwrap();
        router.join(&device("D2"), b).await.unwrap();

        let update = DeviceUpdate::Sample(Sample::magnitude(-3.0, 100.0));
        assert_eq!(router.broadcast(&device("D2"), update.clone()).await, 1);

        let delivery = rx_b.recv().await.unwrap();
        assert_eq!(delivery.device, device("D2"));
        assert_eq!(delivery.update, update);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_unknown_device_is_noop() {
        let router = RoomRouter::new(RecordingBus::new());
        let delivered = router
            .broadcast(&device("D9"), DeviceUpdate::Status("up".into()))
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn full_mailbox_drops_update() {
        let router = RoomRouter::new(RecordingBus::new());
        let (a, mut rx) = session(1);
        router.join(&device("D1"), a).await.unwrap();

        let first = router.broadcast(&device("D1"), DeviceUpdate::Status("1".into())).await;
        let second = router.broadcast(&device("D1"), DeviceUpdate::Status("2".into())).await;

        assert_eq!((first, second), (1, 0));
        assert_eq!(rx.recv().await.unwrap().update, DeviceUpdate::Status("1".into()));
    }

    #[tokio::test]
    async fn leave_all_closes_emptied_rooms_only() {
        let bus = RecordingBus::new();
        let router = RoomRouter::new(bus.clone());
        let (a, _rx_a) = session(8);
        let (b, _rx_b) = session(8);

        router.join(&device("D1"), a.clone()).await.unwrap();
        router.join(&device("D2"), a.clone()).await.unwrap();
        router.join(&device("D2"), b.clone()).await.unwrap();

        let mut left = router.leave_all(&a.id).await;
        left.sort();

        assert_eq!(left, vec![device("D1"), device("D2")]);
        assert_eq!(router.active_devices().await, vec![device("D2")]);
        assert_eq!(router.member_count(&device("D2")).await, 1);
        assert!(router.is_member(&device("D2"), &b.id).await);
        assert!(bus.calls().contains(&"unsubscribe D1".to_string()));
        assert!(!bus.calls().contains(&"unsubscribe D2".to_string()));
    }

    #[tokio::test]
    async fn leave_of_non_member_is_reported() {
        let router = RoomRouter::new(RecordingBus::new());
        let outcome = router.leave(&device("D1"), &ViewerId::new()).await;
        assert_eq!(outcome, Ok(LeaveOutcome::NotMember));
    }

    #[tokio::test]
    async fn concurrent_joins_subscribe_once() {
        let bus = RecordingBus::new();
        let router = Arc::new(RoomRouter::new(bus.clone()));

        let mut receivers = Vec::new();
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let (handle, rx) = session(8);
            receivers.push(rx);
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                router.join(&DeviceId::new("D1").unwrap(), handle).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(bus.calls(), vec!["subscribe D1"]);
        assert_eq!(router.member_count(&device("D1")).await, 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_and_leaves_keep_subscription_in_step_with_room() {
        let bus = RecordingBus::new();
        let router = Arc::new(RoomRouter::new(bus.clone()));

        let mut tasks = Vec::new();
        for i in 0..64 {
            let router = router.clone();
            tasks.push(tokio::spawn(async move {
                let d1 = device("D1");
                let (handle, _rx) = session(8);
                let viewer = handle.id;
                router.join(&d1, handle).await.unwrap();
                tokio::task::yield_now().await;
                // Every third session stays in the room.
                if i % 3 != 0 {
                    router.leave(&d1, &viewer).await.unwrap();
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let calls = bus.calls();
        assert!(!calls.is_empty());
        for (i, call) in calls.iter().enumerate() {
            let expected = if i % 2 == 0 { "subscribe D1" } else { "unsubscribe D1" };
            assert_eq!(call, expected, "call {i} out of step: {calls:?}");
        }

        let members = router.member_count(&device("D1")).await;
        assert_eq!(members, 22);
        assert_eq!(calls.last().map(String::as_str), Some("subscribe D1"));
        assert_eq!(members > 0, calls.last().map(String::as_str) == Some("subscribe D1"));
    }
}
