//! Redis PUBLISH/SUBSCRIBE transport.
//!
//! Each link holds two connections: a dedicated pub/sub connection for
//! subscriptions (Redis forbids other commands on it) and a multiplexed
//! connection for PUBLISH. The pub/sub connection is split once into a
//! command sink and a message stream that lives as long as the link, so
//! messages buffered between reads are never discarded. Channel names are
//! the topic strings verbatim.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use redis::aio::{MultiplexedConnection, PubSubSink};
use redis::AsyncCommands;
use url::Url;

use crate::domain::bus::BusError;
use crate::ports::{BusLink, BusTransport, RawMessage};

/// Opens Redis links for the bus adapter.
#[derive(Clone)]
pub struct RedisTransport {
    client: redis::Client,
    endpoint: String,
}

impl RedisTransport {
    /// Create a transport for a `redis://` or `rediss://` URL.
    ///
    /// Only parses the URL; no connection is made until [`BusTransport::open`].
    pub fn new(url: &Url) -> Result<Self, BusError> {
        let client = redis::Client::open(url.as_str())
            .map_err(|e| BusError::ConnectFailed(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: redacted(url),
        })
    }
}

fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.to_string()
}

#[async_trait]
impl BusTransport for RedisTransport {
    async fn open(&self) -> Result<Box<dyn BusLink>, BusError> {
        let (sink, stream) = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BusError::ConnectFailed(e.to_string()))?
            .split();
        let publisher = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::ConnectFailed(e.to_string()))?;

        tracing::debug!(endpoint = %self.endpoint, "Opened Redis link");
        Ok(Box::new(RedisLink {
            sink,
            messages: stream.boxed(),
            publisher,
        }))
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

struct RedisLink {
    sink: PubSubSink,
    // Polled directly so a dropped `next_message` future loses nothing.
    messages: BoxStream<'static, redis::Msg>,
    publisher: MultiplexedConnection,
}

#[async_trait]
impl BusLink for RedisLink {
    async fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        self.sink
            .subscribe(topic)
            .await
            .map_err(|e| BusError::subscribe_failed(topic, e.to_string()))
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), BusError> {
        self.sink
            .unsubscribe(topic)
            .await
            .map_err(|e| BusError::unsubscribe_failed(topic, e.to_string()))
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError> {
        self.publisher
            .publish::<_, _, i64>(topic, payload)
            .await
            .map(|_receivers| ())
            .map_err(|e| BusError::publish_failed(topic, e.to_string()))
    }

    async fn next_message(&mut self) -> Option<RawMessage> {
        loop {
            let msg = self.messages.next().await?;
            let topic = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => return Some(RawMessage::new(topic, payload)),
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "Dropping undecodable payload");
                }
            }
        }
    }
}
