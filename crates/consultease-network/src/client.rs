//! Resilient broker client.
//!
//! [`MessagingClient`] owns one broker connection at a time and three kinds
//! of background work:
//!
//! - an I/O task per connection that dispatches inbound publishes to topic
//!   handlers;
//! - at most one reconnection worker, sleeping with exponential backoff
//!   between attempts until a connection is established or the client is
//!   stopped;
//! - short-lived publish attempts bounded by `publish_timeout`.
//!
//! # Connection states
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──CONNACK──> Connected
//!      ^                          │                       │
//!      └──────── failure ─────────┴──── link dropped ─────┘
//! ```
//!
//! Every transition back to `Disconnected` that was not requested through
//! [`MessagingClient::disconnect`] schedules the reconnection worker.
//!
//! # Subscriptions
//!
//! Handler patterns are remembered independently of the connection. Each
//! time the client becomes connected it subscribes every recorded pattern
//! once; a pattern registered while connected is subscribed immediately.
//!
//! # Examples
//!
//! ```no_run
//! use consultease_network::{ClientConfig, MessagingClient};
//! use consultease_core::config::BrokerSettings;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> consultease_network::Result<()> {
//!     let client = MessagingClient::new(ClientConfig::new(BrokerSettings::default()));
//!
//!     client
//!         .register_topic_handler("consultease/faculty/+/status", |topic, payload| {
//!             println!("{topic}: {payload}");
//!             Ok(())
//!         })
//!         .await?
//!         .detach();
//!
//!     client.connect().await;
//!     let delivered = client
//!         .publish("consultease/rfid/scan", &json!({"rfid_uid": "04ABCDEF"}))
//!         .await;
//!     println!("published: {delivered}");
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

use crate::backoff::{Backoff, BackoffPolicy};
use crate::error::{MessagingError, Result};
use crate::mqtt::MqttTransport;
use crate::topic::{TopicFilter, validate_publish_topic};
use crate::transport::{
    AnyEvents, AnyLink, AnyTransport, BrokerEvents, BrokerLink, BrokerTransport,
    ConnectOptions, QoS,
};
use bytes::Bytes;
use consultease_core::config::BrokerSettings;
use consultease_core::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_JOIN_TIMEOUT_MS, DEFAULT_KEEP_ALIVE_SECS,
    DEFAULT_PUBLISH_DISCONNECTED_DELAY_MS, DEFAULT_PUBLISH_RETRIES,
    DEFAULT_PUBLISH_RETRY_DELAY_MS, DEFAULT_PUBLISH_TIMEOUT_MS,
};
use consultease_core::{CallbackRegistry, Subscription};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Client tunables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub broker: BrokerSettings,

    /// MQTT keep-alive interval.
    pub keep_alive: Duration,

    /// Upper bound for one connection attempt.
    pub connect_timeout: Duration,

    pub backoff: BackoffPolicy,

    /// Upper bound for one publish (or subscribe) request.
    pub publish_timeout: Duration,

    /// Pause between publish attempts while connected.
    pub retry_delay: Duration,

    /// Pause between publish attempts after the link dropped.
    pub disconnected_retry_delay: Duration,

    /// QoS requested for handler subscriptions.
    pub subscribe_qos: QoS,

    /// How long `disconnect` waits for background tasks before aborting them.
    pub join_timeout: Duration,
}

impl ClientConfig {
    pub fn new(broker: BrokerSettings) -> Self {
        Self {
            broker,
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            backoff: BackoffPolicy::default(),
            publish_timeout: Duration::from_millis(DEFAULT_PUBLISH_TIMEOUT_MS),
            retry_delay: Duration::from_millis(DEFAULT_PUBLISH_RETRY_DELAY_MS),
            disconnected_retry_delay: Duration::from_millis(
                DEFAULT_PUBLISH_DISCONNECTED_DELAY_MS,
            ),
            subscribe_qos: QoS::AtMostOnce,
            join_timeout: Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(BrokerSettings::default())
    }
}

impl From<&BrokerSettings> for ClientConfig {
    fn from(broker: &BrokerSettings) -> Self {
        Self::new(broker.clone())
    }
}

/// Per-call publish parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
    pub qos: QoS,
    pub retain: bool,
    /// Attempts for this publish; `0` is treated as `1`.
    pub max_retries: u32,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            qos: QoS::AtMostOnce,
            retain: false,
            max_retries: DEFAULT_PUBLISH_RETRIES,
        }
    }
}

/// Broker connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        })
    }
}

/// Point-in-time view of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Consecutive failed reconnection attempts.
    pub retry_count: u32,
    /// Delay before the next reconnection attempt.
    pub current_delay: Duration,
    /// Set by `disconnect`, cleared by `connect`.
    pub stopped: bool,
    /// Failures have exceeded `escalate_after` and are logged as errors.
    pub escalated: bool,
}

/// Decoded inbound message as seen by topic handlers.
struct InboundMessage {
    topic: String,
    payload: Value,
}

struct TopicEntry {
    filter: TopicFilter,
    handlers: CallbackRegistry<InboundMessage>,
}

#[derive(Default)]
struct Lifecycle {
    cancel: CancellationToken,
    io: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    /// Incremented per established connection; stale I/O tasks compare against it.
    generation: u64,
}

struct ClientInner {
    config: ClientConfig,
    transport: AnyTransport,
    topics: Mutex<Vec<TopicEntry>>,
    link: Mutex<Option<AnyLink>>,
    state: watch::Sender<ConnectionState>,
    backoff: Mutex<Backoff>,
    stopped: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
    connecting: tokio::sync::Mutex<()>,
}

/// Broker client with topic dispatch and automatic reconnection.
///
/// Cloning yields another handle to the same client.
#[derive(Clone)]
pub struct MessagingClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for MessagingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingClient")
            .field("endpoint", &self.inner.config.broker.endpoint())
            .field("state", &self.inner.state())
            .finish_non_exhaustive()
    }
}

impl MessagingClient {
    /// Client over the MQTT transport.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, AnyTransport::Mqtt(MqttTransport))
    }

    /// Client over an explicit transport.
    pub fn with_transport(config: ClientConfig, transport: AnyTransport) -> Self {
        let backoff = Backoff::new(config.backoff);
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                topics: Mutex::new(Vec::new()),
                link: Mutex::new(None),
                state,
                backoff: Mutex::new(backoff),
                stopped: AtomicBool::new(false),
                lifecycle: Mutex::new(Lifecycle::default()),
                connecting: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn status(&self) -> ConnectionStatus {
        let backoff = self.inner.backoff.lock();
        ConnectionStatus {
            state: self.inner.state(),
            retry_count: backoff.failures(),
            current_delay: backoff.current(),
            stopped: self.inner.stopped.load(Ordering::SeqCst),
            escalated: backoff.should_escalate(),
        }
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Wait until the client reaches `state`; `false` on timeout.
    pub async fn wait_for_state(&self, state: ConnectionState, timeout: Duration) -> bool {
        let mut rx = self.inner.state.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|s| *s == state)).await,
            Ok(Ok(_))
        )
    }

    /// Attempt to connect once, scheduling background reconnection on failure.
    ///
    /// Clears a previous [`disconnect`](Self::disconnect). Returns whether
    /// the client is connected when the call completes; failures are logged,
    /// never returned.
    pub async fn connect(&self) -> bool {
        let cancel = {
            let mut lifecycle = self.inner.lifecycle.lock();
            self.inner.stopped.store(false, Ordering::SeqCst);
            if lifecycle.cancel.is_cancelled() {
                lifecycle.cancel = CancellationToken::new();
            }
            lifecycle.cancel.clone()
        };

        if self.is_connected() {
            debug!("Already connected to broker");
            return true;
        }

        if self.inner.try_connect(&cancel).await {
            true
        } else {
            self.inner.schedule_reconnect();
            false
        }
    }

    /// Stop reconnecting, close the connection, and wait for background tasks.
    ///
    /// The client stays stopped until [`connect`](Self::connect) is called
    /// again. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);

        let (io, reconnect) = {
            let mut lifecycle = self.inner.lifecycle.lock();
            // Cancelled under the lock so a connection that is still being
            // established either lands in `io` below or is torn down by
            // `establish` itself.
            lifecycle.cancel.cancel();
            (lifecycle.io.take(), lifecycle.reconnect.take())
        };

        let link = self.inner.link.lock().take();
        if let Some(link) = link {
            match tokio::time::timeout(self.inner.config.publish_timeout, link.disconnect()).await
            {
                Ok(Ok(())) => debug!("DISCONNECT sent"),
                Ok(Err(e)) => debug!(error = %e, "Link already closed"),
                Err(_) => warn!("Timed out sending DISCONNECT"),
            }
        }

        let join_timeout = self.inner.config.join_timeout;
        for (name, task) in [("I/O loop", io), ("reconnection worker", reconnect)] {
            if let Some(task) = task {
                join_bounded(name, task, join_timeout).await;
            }
        }

        self.inner.link.lock().take();
        self.inner.set_state(ConnectionState::Disconnected);
        info!(endpoint = %self.inner.config.broker.endpoint(), "Disconnected from broker");
    }

    /// Add `handler` for messages whose topic matches `pattern`.
    ///
    /// The first handler for a pattern subscribes it right away when
    /// connected; otherwise the subscription happens on the next connect.
    /// Payloads are decoded as JSON before handlers run; a handler error or
    /// panic is logged and does not affect other handlers.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::InvalidTopic` if `pattern` is malformed.
    pub async fn register_topic_handler<F>(&self, pattern: &str, handler: F) -> Result<Subscription>
    where
        F: Fn(&str, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let filter = TopicFilter::parse(pattern)?;

        let (subscription, subscribe_now) = {
            let mut topics = self.inner.topics.lock();
            let existing = topics.iter().position(|t| t.filter == filter);
            let index = match existing {
                Some(index) => index,
                None => {
                    topics.push(TopicEntry {
                        filter: filter.clone(),
                        handlers: CallbackRegistry::new("topic handlers"),
                    });
                    topics.len() - 1
                }
            };
            let subscription = topics[index]
                .handlers
                .register(move |message: &InboundMessage| {
                    handler(&message.topic, &message.payload)
                });
            // Decided under the topics lock so a concurrent connect either
            // includes this pattern in its snapshot or leaves it to us.
            let subscribe_now = existing.is_none() && self.is_connected();
            (subscription, subscribe_now)
        };

        info!(pattern = %filter, "Registered topic handler");
        if subscribe_now {
            self.inner.subscribe(filter.as_str()).await;
        }
        Ok(subscription)
    }

    /// Patterns that have (or had) handlers, in registration order.
    pub fn topic_patterns(&self) -> Vec<String> {
        self.inner
            .topics
            .lock()
            .iter()
            .map(|t| t.filter.as_str().to_string())
            .collect()
    }

    /// Number of handlers registered for exactly `pattern`.
    pub fn handler_count(&self, pattern: &str) -> usize {
        self.inner
            .topics
            .lock()
            .iter()
            .find(|t| t.filter.as_str() == pattern)
            .map_or(0, |t| t.handlers.len())
    }

    /// Publish `payload` as JSON with default options.
    pub async fn publish<T: Serialize + ?Sized>(&self, topic: &str, payload: &T) -> bool {
        self.publish_with(topic, payload, PublishOptions::default())
            .await
    }

    /// Publish `payload` as JSON.
    ///
    /// Returns `false` without retrying when not connected (a reconnection
    /// is scheduled and the message is dropped). When connected, makes up to
    /// `max_retries` attempts and returns `true` as soon as one is accepted.
    pub async fn publish_with<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        payload: &T,
        options: PublishOptions,
    ) -> bool {
        if let Err(e) = validate_publish_topic(topic) {
            error!(error = %e, "Refusing to publish");
            return false;
        }

        let payload = match serde_json::to_vec(payload) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                error!(topic, error = %e, "Failed to encode payload");
                return false;
            }
        };

        if !self.is_connected() {
            warn!(topic, "Cannot publish: not connected to broker");
            self.inner.schedule_reconnect();
            return false;
        }

        self.inner.publish_attempts(topic, payload, options).await
    }
}

impl ClientInner {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Connection state changed");
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// One connection attempt. Returns whether the client ended up connected.
    async fn try_connect(self: &Arc<Self>, cancel: &CancellationToken) -> bool {
        let _guard = self.connecting.lock().await;

        if cancel.is_cancelled() {
            return false;
        }
        if self.state() == ConnectionState::Connected {
            return true;
        }

        let endpoint = self.config.broker.endpoint();
        info!(%endpoint, client_id = %self.config.broker.client_id, "Connecting to broker");
        self.set_state(ConnectionState::Connecting);

        let options = ConnectOptions {
            broker: &self.config.broker,
            keep_alive: self.config.keep_alive,
        };
        let attempt = tokio::time::timeout(
            self.config.connect_timeout,
            self.transport.connect(options),
        );

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(MessagingError::Stopped),
            result = attempt => match result {
                Ok(result) => result,
                Err(_) => Err(MessagingError::ConnectTimeout {
                    timeout_ms: self.config.connect_timeout.as_millis() as u64,
                }),
            },
        };

        match outcome {
            Ok((link, events)) => self.establish(link, events, cancel).await,
            Err(e) => {
                warn!(%endpoint, error = %e, "Failed to connect to broker");
                self.set_state(ConnectionState::Disconnected);
                false
            }
        }
    }

    async fn establish(
        self: &Arc<Self>,
        link: AnyLink,
        events: AnyEvents,
        cancel: &CancellationToken,
    ) -> bool {
        // The I/O task reports a drop through the lifecycle lock, so it
        // cannot observe this connection before it is fully recorded.
        let established = {
            let mut lifecycle = self.lifecycle.lock();
            if cancel.is_cancelled() {
                None
            } else {
                lifecycle.generation += 1;
                let generation = lifecycle.generation;

                *self.link.lock() = Some(link.clone());
                self.backoff.lock().reset();
                let patterns: Vec<String> = {
                    let topics = self.topics.lock();
                    self.set_state(ConnectionState::Connected);
                    topics.iter().map(|t| t.filter.as_str().to_string()).collect()
                };

                if let Some(stale) = lifecycle.io.take() {
                    stale.abort();
                }
                let inner = Arc::clone(self);
                let token = cancel.clone();
                lifecycle.io = Some(tokio::spawn(async move {
                    inner.io_loop(events, generation, token).await
                }));
                Some((generation, patterns))
            }
        };

        let Some((generation, patterns)) = established else {
            // disconnect() raced with the handshake
            let _ = link.disconnect().await;
            self.set_state(ConnectionState::Disconnected);
            return false;
        };

        info!(
            endpoint = %self.config.broker.endpoint(),
            generation,
            "Connected to broker"
        );

        for pattern in &patterns {
            self.subscribe(pattern).await;
        }
        true
    }

    async fn subscribe(&self, pattern: &str) {
        let link = self.link.lock().clone();
        let Some(link) = link else {
            debug!(pattern, "Subscription deferred until connected");
            return;
        };

        let request = link.subscribe(pattern, self.config.subscribe_qos);
        match tokio::time::timeout(self.config.publish_timeout, request).await {
            Ok(Ok(())) => info!(pattern, "Subscribed"),
            Ok(Err(e)) => warn!(pattern, error = %e, "Subscribe failed"),
            Err(_) => warn!(pattern, "Subscribe timed out"),
        }
    }

    async fn io_loop(self: Arc<Self>, mut events: AnyEvents, generation: u64, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    events.close().await;
                    return;
                }
                event = events.next() => event,
            };

            match event {
                Ok(inbound) => self.dispatch(&inbound.topic, &inbound.payload),
                Err(e) => {
                    self.connection_lost(generation, &e);
                    return;
                }
            }
        }
    }

    fn dispatch(&self, topic: &str, payload: &[u8]) {
        let payload: Value = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!(topic, error = %e, "Dropping message with non-JSON payload");
                return;
            }
        };
        trace!(topic, %payload, "Inbound message");

        let matching: Vec<CallbackRegistry<InboundMessage>> = self
            .topics
            .lock()
            .iter()
            .filter(|t| t.filter.matches(topic))
            .map(|t| t.handlers.clone())
            .collect();

        if matching.is_empty() {
            debug!(topic, "No handler for inbound message");
            return;
        }

        let message = InboundMessage {
            topic: topic.to_string(),
            payload,
        };
        for handlers in matching {
            handlers.notify(&message);
        }
    }

    fn connection_lost(self: &Arc<Self>, generation: u64, error: &MessagingError) {
        if self.lifecycle.lock().generation != generation {
            return;
        }

        self.link.lock().take();
        self.set_state(ConnectionState::Disconnected);

        if self.is_stopped() {
            debug!(error = %error, "Connection closed after stop");
            return;
        }
        warn!(error = %error, "Connection to broker lost");
        self.schedule_reconnect();
    }

    /// Start the reconnection worker unless stopped or already running.
    fn schedule_reconnect(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }

        let mut lifecycle = self.lifecycle.lock();
        if lifecycle
            .reconnect
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
        {
            trace!("Reconnection already scheduled");
            return;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "Cannot schedule reconnection outside a Tokio runtime");
                return;
            }
        };

        let inner = Arc::clone(self);
        let cancel = lifecycle.cancel.clone();
        lifecycle.reconnect = Some(runtime.spawn(async move { inner.reconnect_loop(cancel).await }));
    }

    async fn reconnect_loop(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            {
                // Deregister under the lock so a drop that follows can
                // schedule a fresh worker.
                let mut lifecycle = self.lifecycle.lock();
                if self.state() == ConnectionState::Connected {
                    lifecycle.reconnect = None;
                    return;
                }
            }

            let delay = self.backoff.lock().current();
            info!(
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to broker after delay"
            );
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            if self.try_connect(&cancel).await {
                info!("Reconnected to broker");
                continue;
            }
            if cancel.is_cancelled() {
                return;
            }

            let (failures, next, escalate) = {
                let mut backoff = self.backoff.lock();
                let next = backoff.record_failure();
                (backoff.failures(), next, backoff.should_escalate())
            };
            if escalate {
                error!(
                    failures,
                    next_delay_ms = next.as_millis() as u64,
                    "Broker still unreachable, continuing to retry"
                );
            } else {
                warn!(
                    failures,
                    next_delay_ms = next.as_millis() as u64,
                    "Reconnection attempt failed"
                );
            }
        }
    }

    async fn publish_attempts(
        self: &Arc<Self>,
        topic: &str,
        payload: Bytes,
        options: PublishOptions,
    ) -> bool {
        let attempts = options.max_retries.max(1);

        for attempt in 1..=attempts {
            let link = self.link.lock().clone();
            match link {
                Some(link) => {
                    let request = link.publish(topic, payload.clone(), options.qos, options.retain);
                    match tokio::time::timeout(self.config.publish_timeout, request).await {
                        Ok(Ok(())) => {
                            debug!(topic, bytes = payload.len(), attempt, "Published");
                            return true;
                        }
                        Ok(Err(e)) => {
                            warn!(topic, attempt, attempts, error = %e, "Publish attempt failed")
                        }
                        Err(_) => warn!(
                            topic,
                            attempt,
                            attempts,
                            timeout_ms = self.config.publish_timeout.as_millis() as u64,
                            "Publish attempt timed out"
                        ),
                    }
                }
                None => warn!(topic, attempt, attempts, "Link dropped before publish"),
            }

            if attempt < attempts {
                if self.state() == ConnectionState::Connected {
                    tokio::time::sleep(self.config.retry_delay).await;
                } else {
                    self.schedule_reconnect();
                    tokio::time::sleep(self.config.disconnected_retry_delay).await;
                }
            }
        }

        error!(topic, attempts, "Failed to publish message");
        false
    }
}

async fn join_bounded(name: &str, task: JoinHandle<()>, timeout: Duration) {
    let abort = task.abort_handle();
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(())) => trace!(task = name, "Task exited"),
        Ok(Err(e)) if e.is_cancelled() => trace!(task = name, "Task cancelled"),
        Ok(Err(e)) => warn!(task = name, error = %e, "Task terminated abnormally"),
        Err(_) => {
            warn!(
                task = name,
                timeout_ms = timeout.as_millis() as u64,
                "Task did not exit in time, aborting"
            );
            abort.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBroker;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.broker.endpoint(), "localhost:1883");
        assert_eq!(config.keep_alive, Duration::from_secs(60));
        assert_eq!(config.publish_timeout, Duration::from_secs(2));
        assert_eq!(config.retry_delay, Duration::from_millis(500));
        assert_eq!(config.disconnected_retry_delay, Duration::from_secs(1));
        assert_eq!(config.backoff.initial, Duration::from_secs(5));
    }

    #[test]
    fn test_default_publish_options() {
        let options = PublishOptions::default();
        assert_eq!(options.qos, QoS::AtMostOnce);
        assert!(!options.retain);
        assert_eq!(options.max_retries, 3);
    }

    #[test]
    fn test_initial_status() {
        let (broker, _handle) = MockBroker::new();
        let client = MessagingClient::with_transport(ClientConfig::default(), broker.into());
        assert_eq!(
            client.status(),
            ConnectionStatus {
                state: ConnectionState::Disconnected,
                retry_count: 0,
                current_delay: Duration::from_secs(5),
                stopped: false,
                escalated: false,
            }
        );
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_rejected() {
        let (broker, _handle) = MockBroker::new();
        let client = MessagingClient::with_transport(ClientConfig::default(), broker.into());
        let result = client.register_topic_handler("a/#/b", |_, _| Ok(())).await;
        assert!(matches!(result, Err(MessagingError::InvalidTopic { .. })));
        assert!(client.topic_patterns().is_empty());
    }

    #[tokio::test]
    async fn test_publish_rejects_wildcard_topic() {
        let (broker, handle) = MockBroker::new();
        let client = MessagingClient::with_transport(ClientConfig::default(), broker.into());
        assert!(client.connect().await);
        assert!(!client.publish("a/+", &1).await);
        assert!(handle.published().is_empty());
        client.disconnect().await;
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
