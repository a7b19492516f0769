//! Error types for broker messaging.
//!
//! Lifecycle and publish operations on the client never surface these to the
//! caller; they are logged and turned into retries or `false` results. They
//! do reach callers of the pure parsers ([`TopicFilter::parse`]) and handler
//! registration.
//!
//! [`TopicFilter::parse`]: crate::topic::TopicFilter::parse

use thiserror::Error;

/// Result type alias for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Errors that can occur while talking to the broker.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// No live broker connection.
    #[error("Not connected to broker")]
    NotConnected,

    /// Broker rejected the connection (CONNACK return code).
    #[error("Connection refused by broker: {reason}")]
    ConnectionRefused { reason: String },

    /// Connection attempt did not complete in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectTimeout { timeout_ms: u64 },

    /// Established connection dropped.
    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },

    /// Transport-level failure while issuing a request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Topic or topic pattern is malformed.
    #[error("Invalid topic {topic:?}: {reason}")]
    InvalidTopic { topic: String, reason: String },

    /// Payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client was stopped by the caller.
    #[error("Client stopped")]
    Stopped,
}

impl MessagingError {
    pub fn refused(reason: impl Into<String>) -> Self {
        Self::ConnectionRefused {
            reason: reason.into(),
        }
    }

    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::ConnectionLost {
            reason: reason.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn invalid_topic(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTopic {
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            MessagingError::refused("BadUserNamePassword").to_string(),
            "Connection refused by broker: BadUserNamePassword"
        );
        assert_eq!(
            MessagingError::ConnectTimeout { timeout_ms: 10000 }.to_string(),
            "Connection timeout after 10000ms"
        );
        assert_eq!(
            MessagingError::invalid_topic("a/#/b", "'#' must be the last level").to_string(),
            "Invalid topic \"a/#/b\": '#' must be the last level"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let err: MessagingError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, MessagingError::Serialization(_)));
    }
}
