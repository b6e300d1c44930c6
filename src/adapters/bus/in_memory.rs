//! In-memory loopback broker for tests and local development.
//!
//! Behaves like a pub/sub broker with per-link subscriptions and records
//! every subscribe, unsubscribe and publish for assertions. Links can be
//! severed and the broker made unreachable to exercise reconnection.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! It uses `.expect()` on lock operations which will panic if locks are poisoned.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::domain::bus::BusError;
use crate::ports::{BusLink, BusTransport, RawMessage};

/// In-memory broker implementing [`BusTransport`].
///
/// Cloning yields another handle to the same broker.
///
/// # Panics
///
/// Methods may panic if the internal lock is poisoned.
///
/// # Example
///
/// ```ignore
/// let broker = InMemoryBroker::new();
/// let (bus, inbound) = BusAdapter::new(Arc::new(broker.clone()), BusAdapterConfig::default());
/// bus.connect().await;
///
/// broker.deliver("devices/D1/data", "0;100A");
/// assert_eq!(broker.published_to("devices/D1/command"), vec!["S100"]);
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

struct BrokerState {
    reachable: bool,
    fail_publish: bool,
    next_link_id: u64,
    opened: usize,
    links: HashMap<u64, LinkEntry>,
    subscribe_calls: Vec<String>,
    unsubscribe_calls: Vec<String>,
    published: Vec<RawMessage>,
}

struct LinkEntry {
    topics: HashSet<String>,
    sender: mpsc::UnboundedSender<RawMessage>,
}

impl BrokerState {
    fn fan_out(&self, message: &RawMessage) -> usize {
        self.links
            .values()
            .filter(|link| link.topics.contains(&message.topic))
            .filter(|link| link.sender.send(message.clone()).is_ok())
            .count()
    }
}

impl InMemoryBroker {
    /// Creates a reachable broker with no links.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                reachable: true,
                fail_publish: false,
                next_link_id: 0,
                opened: 0,
                links: HashMap::new(),
                subscribe_calls: Vec::new(),
                unsubscribe_calls: Vec::new(),
                published: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        self.state.lock().expect("InMemoryBroker: state lock poisoned")
    }

    // === Fault Injection ===

    /// Refuse (or accept again) new links.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Make every publish fail (or succeed again).
    pub fn set_fail_publish(&self, fail: bool) {
        self.lock().fail_publish = fail;
    }

    /// Drop every live link. Their `next_message` returns `None`.
    pub fn sever_links(&self) {
        self.lock().links.clear();
    }

    // === Device Simulation ===

    /// Publish as a device would. Returns how many links received it.
    pub fn deliver(&self, topic: &str, payload: &str) -> usize {
        self.lock().fan_out(&RawMessage::new(topic, payload))
    }

    // === Test Helpers ===

    /// Every message published through a link, in order.
    pub fn published(&self) -> Vec<RawMessage> {
        self.lock().published.clone()
    }

    /// Payloads published to one topic, in order.
    pub fn published_to(&self, topic: &str) -> Vec<String> {
        self.lock()
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Topics passed to `subscribe`, in call order.
    pub fn subscribe_calls(&self) -> Vec<String> {
        self.lock().subscribe_calls.clone()
    }

    /// Topics passed to `unsubscribe`, in call order.
    pub fn unsubscribe_calls(&self) -> Vec<String> {
        self.lock().unsubscribe_calls.clone()
    }

    /// Union of topics subscribed on live links.
    pub fn subscriptions(&self) -> BTreeSet<String> {
        self.lock()
            .links
            .values()
            .flat_map(|link| link.topics.iter().cloned())
            .collect()
    }

    /// Number of links successfully opened so far.
    pub fn open_count(&self) -> usize {
        self.lock().opened
    }

    /// Number of live links.
    pub fn live_links(&self) -> usize {
        self.lock().links.len()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BusTransport for InMemoryBroker {
    async fn open(&self) -> Result<Box<dyn BusLink>, BusError> {
        let mut state = self.lock();
        if !state.reachable {
            return Err(BusError::ConnectFailed("broker unreachable".to_string()));
        }

        let id = state.next_link_id;
        state.next_link_id += 1;
        state.opened += 1;

        let (sender, receiver) = mpsc::unbounded_channel();
        state.links.insert(
            id,
            LinkEntry {
                topics: HashSet::new(),
                sender,
            },
        );

        Ok(Box::new(InMemoryLink {
            id,
            state: Arc::clone(&self.state),
            receiver,
        }))
    }

    fn endpoint(&self) -> String {
        "memory://".to_string()
    }
}

struct InMemoryLink {
    id: u64,
    state: Arc<Mutex<BrokerState>>,
    receiver: mpsc::UnboundedReceiver<RawMessage>,
}

impl InMemoryLink {
    fn lock(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        self.state.lock().expect("InMemoryBroker: state lock poisoned")
    }
}

#[async_trait]
impl BusLink for InMemoryLink {
    async fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        let id = self.id;
        let mut state = self.lock();
        state.subscribe_calls.push(topic.to_string());
        let link = state
            .links
            .get_mut(&id)
            .ok_or_else(|| BusError::subscribe_failed(topic, "link severed"))?;
        link.topics.insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), BusError> {
        let id = self.id;
        let mut state = self.lock();
        state.unsubscribe_calls.push(topic.to_string());
        let link = state
            .links
            .get_mut(&id)
            .ok_or_else(|| BusError::unsubscribe_failed(topic, "link severed"))?;
        link.topics.remove(topic);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError> {
        let id = self.id;
        let mut state = self.lock();
        if !state.links.contains_key(&id) {
            return Err(BusError::publish_failed(topic, "link severed"));
        }
        if state.fail_publish {
            return Err(BusError::publish_failed(topic, "publish rejected by broker"));
        }
        let message = RawMessage::new(topic, payload);
        state.published.push(message.clone());
        state.fan_out(&message);
        Ok(())
    }

    async fn next_message(&mut self) -> Option<RawMessage> {
        self.receiver.recv().await
    }
}

impl Drop for InMemoryLink {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.links.remove(&self.id);
        }
    }
}
