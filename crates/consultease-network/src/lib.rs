//! Broker messaging for the ConsultEase bridge.
//!
//! [`MessagingClient`] keeps one MQTT connection alive, dispatches inbound
//! JSON messages to topic handlers, and publishes best-effort with bounded
//! retries. Lost connections are re-established by a background worker
//! with exponential backoff.
//!
//! # Components
//!
//! - **client**: the [`MessagingClient`] and its configuration
//! - **topic**: topic pattern parsing and matching (`+` and `#` wildcards)
//! - **backoff**: reconnection delay policy
//! - **transport**: transport traits and enum dispatch
//! - **mqtt**: rumqttc-backed transport
//! - **mock**: in-memory broker for tests and development
//!
//! # Example
//!
//! ```no_run
//! use consultease_core::config::Settings;
//! use consultease_network::{ClientConfig, MessagingClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_env()?;
//! let client = MessagingClient::new(ClientConfig::from(&settings.broker));
//!
//! client.connect().await;
//! client.publish("consultease/rfid/scan", &serde_json::json!({"rfid_uid": "04ABCDEF"})).await;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
mod client;
pub mod error;
pub mod mock;
pub mod mqtt;
pub mod topic;
pub mod transport;

pub use backoff::{Backoff, BackoffPolicy};
pub use client::{ClientConfig, ConnectionState, ConnectionStatus, MessagingClient, PublishOptions};
pub use error::{MessagingError, Result};
pub use topic::TopicFilter;
pub use transport::QoS;
