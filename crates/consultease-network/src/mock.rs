//! In-memory broker for testing and development.
//!
//! [`MockBroker`] is a transport whose "network" is a shared state object;
//! [`MockBrokerHandle`] drives it from tests: refuse connections, fail
//! publishes, deliver inbound messages, or drop the live session. Delivery
//! honours the session's subscriptions, so a message only reaches the client
//! if the client actually subscribed to a matching pattern.

use crate::error::{MessagingError, Result};
use crate::topic::TopicFilter;
use crate::transport::{
    AnyEvents, AnyLink, BrokerEvents, BrokerLink, BrokerTransport, ConnectOptions,
    InboundPublish, QoS,
};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Message accepted by the mock broker from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

impl PublishedMessage {
    /// Payload decoded as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.payload).ok()
    }
}

#[derive(Debug)]
struct Session {
    id: u64,
    inbound: mpsc::UnboundedSender<InboundPublish>,
    subscriptions: Vec<TopicFilter>,
}

#[derive(Debug, Default)]
struct BrokerState {
    refuse_next: u32,
    unavailable: bool,
    fail_publishes: u32,
    publish_latency: Duration,
    connect_latency: Duration,
    connect_attempts: u32,
    next_session: u64,
    session: Option<Session>,
    subscribe_log: Vec<String>,
    published: Vec<PublishedMessage>,
    last_client_id: Option<String>,
    last_credentials: Option<(String, String)>,
}

/// Mock broker transport. Clones share the same broker.
///
/// # Examples
///
/// ```
/// use consultease_network::mock::MockBroker;
/// use consultease_network::{ClientConfig, MessagingClient};
///
/// #[tokio::main]
/// async fn main() {
///     let (broker, handle) = MockBroker::new();
///     let client = MessagingClient::with_transport(ClientConfig::default(), broker.into());
///
///     assert!(client.connect().await);
///     assert!(client.publish("consultease/test", &serde_json::json!({"ok": true})).await);
///     assert_eq!(handle.published()[0].topic, "consultease/test");
///
///     client.disconnect().await;
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MockBroker {
    pub fn new() -> (Self, MockBrokerHandle) {
        let state = Arc::new(Mutex::new(BrokerState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockBrokerHandle { state },
        )
    }
}

impl From<MockBroker> for crate::transport::AnyTransport {
    fn from(broker: MockBroker) -> Self {
        Self::Mock(broker)
    }
}

impl BrokerTransport for MockBroker {
    async fn connect(&self, options: ConnectOptions<'_>) -> Result<(AnyLink, AnyEvents)> {
        let latency = {
            let mut state = self.state.lock();
            state.connect_attempts += 1;
            state.connect_latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        state.last_client_id = Some(options.broker.client_id.clone());
        state.last_credentials = options
            .broker
            .credentials()
            .map(|(u, p)| (u.to_string(), p.to_string()));

        if state.unavailable {
            return Err(MessagingError::transport("connection refused (os error 111)"));
        }
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(MessagingError::refused("ServiceUnavailable"));
        }

        state.next_session += 1;
        let id = state.next_session;
        let (inbound, rx) = mpsc::unbounded_channel();
        // Clean session: a new connection replaces the old one entirely.
        state.session = Some(Session {
            id,
            inbound,
            subscriptions: Vec::new(),
        });

        let link = MockLink {
            session: id,
            state: Arc::clone(&self.state),
        };
        let events = MockEvents { inbound: rx };
        Ok((AnyLink::Mock(link), AnyEvents::Mock(events)))
    }
}

/// Request side of a mock session.
#[derive(Debug, Clone)]
pub struct MockLink {
    session: u64,
    state: Arc<Mutex<BrokerState>>,
}

impl MockLink {
    fn with_session<R>(&self, f: impl FnOnce(&mut BrokerState) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock();
        if state.session.as_ref().map(|s| s.id) != Some(self.session) {
            return Err(MessagingError::NotConnected);
        }
        f(&mut state)
    }
}

impl BrokerLink for MockLink {
    async fn subscribe(&self, filter: &str, _qos: QoS) -> Result<()> {
        let parsed = TopicFilter::parse(filter)?;
        self.with_session(|state| {
            state.subscribe_log.push(filter.to_string());
            if let Some(session) = state.session.as_mut() {
                session.subscriptions.retain(|s| s != &parsed);
                session.subscriptions.push(parsed);
            }
            Ok(())
        })
    }

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS, retain: bool) -> Result<()> {
        let latency = self.state.lock().publish_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.with_session(|state| {
            if state.fail_publishes > 0 {
                state.fail_publishes -= 1;
                return Err(MessagingError::transport("request queue closed"));
            }
            state.published.push(PublishedMessage {
                topic: topic.to_string(),
                payload,
                qos,
                retain,
            });
            Ok(())
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.with_session(|state| {
            state.session = None;
            Ok(())
        })
    }
}

/// Inbound side of a mock session.
#[derive(Debug)]
pub struct MockEvents {
    inbound: mpsc::UnboundedReceiver<InboundPublish>,
}

impl BrokerEvents for MockEvents {
    async fn next(&mut self) -> Result<InboundPublish> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| MessagingError::connection_lost("mock session closed"))
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

/// Handle for controlling a [`MockBroker`].
#[derive(Debug, Clone)]
pub struct MockBrokerHandle {
    state: Arc<Mutex<BrokerState>>,
}

impl MockBrokerHandle {
    /// Refuse the next `count` connection attempts with a CONNACK error.
    pub fn refuse_connections(&self, count: u32) {
        self.state.lock().refuse_next = count;
    }

    /// Make the broker unreachable (or reachable again).
    pub fn set_available(&self, available: bool) {
        self.state.lock().unavailable = !available;
    }

    /// Fail the next `count` publish requests.
    pub fn fail_next_publishes(&self, count: u32) {
        self.state.lock().fail_publishes = count;
    }

    /// Delay every connection handshake by `latency`.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.state.lock().connect_latency = latency;
    }

    /// Delay every publish request by `latency`.
    pub fn set_publish_latency(&self, latency: Duration) {
        self.state.lock().publish_latency = latency;
    }

    /// Deliver a raw payload to the client if its session subscribed to a
    /// matching pattern. Returns whether the message was routed.
    pub fn deliver(&self, topic: &str, payload: impl Into<Bytes>) -> bool {
        let state = self.state.lock();
        let Some(session) = state.session.as_ref() else {
            return false;
        };
        if !session.subscriptions.iter().any(|s| s.matches(topic)) {
            return false;
        }
        session
            .inbound
            .send(InboundPublish {
                topic: topic.to_string(),
                payload: payload.into(),
            })
            .is_ok()
    }

    /// Deliver `payload` encoded as JSON. See [`deliver`](Self::deliver).
    pub fn deliver_json<T: Serialize>(&self, topic: &str, payload: &T) -> bool {
        match serde_json::to_vec(payload) {
            Ok(bytes) => self.deliver(topic, bytes),
            Err(_) => false,
        }
    }

    /// Drop the live session as if the network failed.
    pub fn drop_connection(&self) {
        self.state.lock().session = None;
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().session.is_some()
    }

    /// Every subscribe request received, across sessions, in order.
    pub fn subscribe_log(&self) -> Vec<String> {
        self.state.lock().subscribe_log.clone()
    }

    /// Patterns subscribed by the live session.
    pub fn active_subscriptions(&self) -> Vec<String> {
        self.state
            .lock()
            .session
            .as_ref()
            .map(|s| s.subscriptions.iter().map(|f| f.as_str().to_string()).collect())
            .unwrap_or_default()
    }

    /// Every accepted publish, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().published.clone()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.lock().connect_attempts
    }

    pub fn last_client_id(&self) -> Option<String> {
        self.state.lock().last_client_id.clone()
    }

    pub fn last_credentials(&self) -> Option<(String, String)> {
        self.state.lock().last_credentials.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consultease_core::config::BrokerSettings;

    async fn open(broker: &MockBroker) -> (AnyLink, AnyEvents) {
        broker
            .connect(ConnectOptions {
                broker: &BrokerSettings::default(),
                keep_alive: Duration::from_secs(60),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_delivery_requires_subscription() {
        let (broker, handle) = MockBroker::new();
        let (link, mut events) = open(&broker).await;

        assert!(!handle.deliver("a/b", "{}"));
        link.subscribe("a/+", QoS::AtMostOnce).await.unwrap();
        assert!(handle.deliver("a/b", "{}"));

        let inbound = events.next().await.unwrap();
        assert_eq!(inbound.topic, "a/b");
        assert_eq!(handle.active_subscriptions(), vec!["a/+"]);
    }

    #[tokio::test]
    async fn test_refused_then_accepted() {
        let (broker, handle) = MockBroker::new();
        handle.refuse_connections(1);

        let options = BrokerSettings::default();
        let first = broker
            .connect(ConnectOptions {
                broker: &options,
                keep_alive: Duration::from_secs(60),
            })
            .await;
        assert!(matches!(first, Err(MessagingError::ConnectionRefused { .. })));

        let _ = open(&broker).await;
        assert_eq!(handle.connect_attempts(), 2);
        assert_eq!(handle.last_client_id().as_deref(), Some("central_system"));
    }

    #[tokio::test]
    async fn test_dropped_session_invalidates_link() {
        let (broker, handle) = MockBroker::new();
        let (link, mut events) = open(&broker).await;

        handle.drop_connection();

        assert!(matches!(
            link.publish("a", Bytes::from_static(b"1"), QoS::AtMostOnce, false)
                .await,
            Err(MessagingError::NotConnected)
        ));
        assert!(matches!(
            events.next().await,
            Err(MessagingError::ConnectionLost { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_publishes_are_not_recorded() {
        let (broker, handle) = MockBroker::new();
        let (link, _events) = open(&broker).await;
        handle.fail_next_publishes(1);

        assert!(link.publish("t", Bytes::from_static(b"1"), QoS::AtLeastOnce, true).await.is_err());
        link.publish("t", Bytes::from_static(b"2"), QoS::AtLeastOnce, true)
            .await
            .unwrap();

        let published = handle.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload, Bytes::from_static(b"2"));
        assert!(published[0].retain);
        assert_eq!(published[0].json(), Some(serde_json::json!(2)));
    }
}
