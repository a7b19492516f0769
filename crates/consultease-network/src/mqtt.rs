//! MQTT 3.1.1 transport over `rumqttc`.
//!
//! Each connection gets a fresh `AsyncClient`/`EventLoop` pair with a clean
//! session. rumqttc would reconnect on its own when its event loop is polled
//! after an error; the messaging client owns reconnection instead, so the
//! event loop is dropped as soon as it reports an error.

use crate::error::{MessagingError, Result};
use crate::transport::{
    AnyEvents, AnyLink, BrokerEvents, BrokerLink, BrokerTransport, ConnectOptions,
    InboundPublish, QoS,
};
use bytes::Bytes;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet,
};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

/// Request queue depth between `AsyncClient` and its event loop.
const REQUEST_CAPACITY: usize = 64;

/// Time allowed for a DISCONNECT to be flushed on close.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// rumqttc-backed transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct MqttTransport;

impl BrokerTransport for MqttTransport {
    async fn connect(&self, options: ConnectOptions<'_>) -> Result<(AnyLink, AnyEvents)> {
        let broker = options.broker;
        let mut mqtt_options =
            MqttOptions::new(broker.client_id.clone(), broker.host.clone(), broker.port);
        mqtt_options.set_keep_alive(options.keep_alive);
        mqtt_options.set_clean_session(true);
        if let Some((username, password)) = broker.credentials() {
            mqtt_options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        debug!(
                            endpoint = %broker.endpoint(),
                            session_present = ack.session_present,
                            "CONNACK received"
                        );
                        break;
                    }
                    return Err(MessagingError::refused(format!("{:?}", ack.code)));
                }
                Ok(event) => trace!(?event, "Event before CONNACK"),
                Err(ConnectionError::ConnectionRefused(code)) => {
                    return Err(MessagingError::refused(format!("{code:?}")));
                }
                Err(e) => return Err(MessagingError::transport(e.to_string())),
            }
        }

        Ok((
            AnyLink::Mqtt(MqttLink { client }),
            AnyEvents::Mqtt(MqttEvents { eventloop }),
        ))
    }
}

/// Request handle for one rumqttc connection.
#[derive(Clone)]
pub struct MqttLink {
    client: AsyncClient,
}

impl fmt::Debug for MqttLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttLink").finish_non_exhaustive()
    }
}

impl BrokerLink for MqttLink {
    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<()> {
        self.client
            .subscribe(filter, qos.into())
            .await
            .map_err(|e| MessagingError::transport(e.to_string()))
    }

    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS, retain: bool) -> Result<()> {
        self.client
            .publish(topic, qos.into(), retain, payload.to_vec())
            .await
            .map_err(|e| MessagingError::transport(e.to_string()))
    }

    async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| MessagingError::transport(e.to_string()))
    }
}

/// Event loop of one rumqttc connection.
pub struct MqttEvents {
    eventloop: EventLoop,
}

impl fmt::Debug for MqttEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttEvents").finish_non_exhaustive()
    }
}

impl BrokerEvents for MqttEvents {
    async fn next(&mut self) -> Result<InboundPublish> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(InboundPublish {
                        topic: publish.topic,
                        payload: publish.payload,
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    return Err(MessagingError::connection_lost("broker closed the session"));
                }
                Ok(event) => trace!(?event, "MQTT event"),
                Err(e) => return Err(MessagingError::connection_lost(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        let flushed = tokio::time::timeout(CLOSE_GRACE, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            debug!("DISCONNECT not flushed before close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consultease_core::config::BrokerSettings;

    #[test]
    fn test_qos_conversion() {
        assert_eq!(rumqttc::QoS::from(QoS::AtMostOnce), rumqttc::QoS::AtMostOnce);
        assert_eq!(rumqttc::QoS::from(QoS::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
        assert_eq!(rumqttc::QoS::from(QoS::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_unreachable_broker_fails() {
        // Port 1 on loopback is closed on any sane test host.
        let broker = BrokerSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..BrokerSettings::default()
        };
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            MqttTransport.connect(ConnectOptions {
                broker: &broker,
                keep_alive: Duration::from_secs(60),
            }),
        )
        .await
        .expect("connect attempt should fail fast");

        assert!(matches!(result, Err(MessagingError::Transport(_))));
    }
}
