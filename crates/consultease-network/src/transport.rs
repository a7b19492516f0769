//! Broker transport seam.
//!
//! The messaging client talks to the broker through three traits:
//!
//! - [`BrokerTransport`] opens a connection and waits for the broker's
//!   acknowledgement;
//! - [`BrokerLink`] issues requests (subscribe, publish, disconnect) on an
//!   established connection and is cheap to clone;
//! - [`BrokerEvents`] yields inbound publishes until the connection drops.
//!
//! As with the input backends, native `async fn` traits are dispatched
//! through enums: [`AnyTransport`], [`AnyLink`] and [`AnyEvents`] cover the
//! rumqttc transport and the in-memory [`MockBroker`](crate::mock::MockBroker).

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::mock::{MockBroker, MockEvents, MockLink};
use crate::mqtt::{MqttEvents, MqttLink, MqttTransport};
use bytes::Bytes;
use consultease_core::config::BrokerSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// MQTT delivery guarantee.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Publish received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPublish {
    pub topic: String,
    pub payload: Bytes,
}

/// Connection parameters handed to a transport.
#[derive(Debug, Clone)]
pub struct ConnectOptions<'a> {
    pub broker: &'a BrokerSettings,
    pub keep_alive: Duration,
}

/// Opens broker connections.
pub trait BrokerTransport: Send + Sync {
    /// Connect and wait for the broker to accept the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker is unreachable or refuses the session.
    async fn connect(&self, options: ConnectOptions<'_>) -> Result<(AnyLink, AnyEvents)>;
}

/// Request side of an established connection.
pub trait BrokerLink: Clone + Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the request cannot be handed to the connection.
    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the request cannot be handed to the connection.
    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS, retain: bool) -> Result<()>;

    /// Ask the broker to close the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is already gone.
    async fn disconnect(&self) -> Result<()>;
}

/// Inbound side of an established connection.
pub trait BrokerEvents: Send {
    /// Wait for the next inbound publish.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection is lost; the stream is finished
    /// afterwards.
    async fn next(&mut self) -> Result<InboundPublish>;

    /// Drive the connection until a pending disconnect has been sent.
    async fn close(&mut self);
}

/// Enum wrapper for transports.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyTransport {
    Mqtt(MqttTransport),
    Mock(MockBroker),
}

impl BrokerTransport for AnyTransport {
    async fn connect(&self, options: ConnectOptions<'_>) -> Result<(AnyLink, AnyEvents)> {
        match self {
            Self::Mqtt(transport) => transport.connect(options).await,
            Self::Mock(transport) => transport.connect(options).await,
        }
    }
}

/// Enum wrapper for connection links.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyLink {
    Mqtt(MqttLink),
    Mock(MockLink),
}

impl BrokerLink for AnyLink {
    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<()> {
        match self {
            Self::Mqtt(link) => link.subscribe(filter, qos).await,
            Self::Mock(link) => link.subscribe(filter, qos).await,
        }
    }

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS, retain: bool) -> Result<()> {
        match self {
            Self::Mqtt(link) => link.publish(topic, payload, qos, retain).await,
            Self::Mock(link) => link.publish(topic, payload, qos, retain).await,
        }
    }

    async fn disconnect(&self) -> Result<()> {
        match self {
            Self::Mqtt(link) => link.disconnect().await,
            Self::Mock(link) => link.disconnect().await,
        }
    }
}

/// Enum wrapper for inbound event streams.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyEvents {
    Mqtt(MqttEvents),
    Mock(MockEvents),
}

impl BrokerEvents for AnyEvents {
    async fn next(&mut self) -> Result<InboundPublish> {
        match self {
            Self::Mqtt(events) => events.next().await,
            Self::Mock(events) => events.next().await,
        }
    }

    async fn close(&mut self) {
        match self {
            Self::Mqtt(events) => events.close().await,
            Self::Mock(events) => events.close().await,
        }
    }
}
