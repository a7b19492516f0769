//! Shared constants for the ConsultEase card-reader bridge.
//!
//! Defaults for the environment-driven settings, the recommended timing
//! values for the decoder and the broker client, and the card identifier
//! limits all live here so that every crate agrees on them.
//!
//! # Usage
//!
//! ```
//! use consultease_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(DEFAULT_BROKER_PORT, 1883);
//! let debounce = Duration::from_millis(DEFAULT_DEBOUNCE_MS);
//! assert_eq!(debounce.as_millis(), 500);
//! ```

// ============================================================================
// Environment Keys
// ============================================================================

/// Broker host name or address.
pub const ENV_BROKER_HOST: &str = "MQTT_BROKER_HOST";

/// Broker TCP port.
pub const ENV_BROKER_PORT: &str = "MQTT_BROKER_PORT";

/// MQTT client identifier.
pub const ENV_CLIENT_ID: &str = "MQTT_CLIENT_ID";

/// Optional broker user name.
pub const ENV_USERNAME: &str = "MQTT_USERNAME";

/// Optional broker password.
pub const ENV_PASSWORD: &str = "MQTT_PASSWORD";

/// Explicit input device path (skips auto-detection).
pub const ENV_DEVICE_PATH: &str = "RFID_DEVICE_PATH";

/// Forces simulation mode when truthy.
pub const ENV_SIMULATION_MODE: &str = "RFID_SIMULATION_MODE";

// ============================================================================
// Broker Defaults
// ============================================================================

/// Default broker host.
pub const DEFAULT_BROKER_HOST: &str = "localhost";

/// Default MQTT port (unencrypted).
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Default client identifier announced to the broker.
pub const DEFAULT_CLIENT_ID: &str = "central_system";

/// Keep-alive interval negotiated with the broker (seconds).
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 60;

/// Upper bound for one connection attempt, including CONNACK (milliseconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Reconnection Backoff
// ============================================================================

/// First delay before a reconnection attempt (milliseconds).
pub const DEFAULT_RECONNECT_INITIAL_MS: u64 = 5_000;

/// Upper bound for the reconnection delay (milliseconds).
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 60_000;

/// Growth factor applied to the delay after each failed attempt.
pub const DEFAULT_RECONNECT_FACTOR: f64 = 1.5;

/// Consecutive failures after which reconnection failures log at error level.
pub const DEFAULT_RECONNECT_ESCALATE_AFTER: u32 = 10;

// ============================================================================
// Publish
// ============================================================================

/// Attempts made by a single publish call.
pub const DEFAULT_PUBLISH_RETRIES: u32 = 3;

/// Pause between publish attempts while still connected (milliseconds).
pub const DEFAULT_PUBLISH_RETRY_DELAY_MS: u64 = 500;

/// Pause between publish attempts after the link dropped (milliseconds).
pub const DEFAULT_PUBLISH_DISCONNECTED_DELAY_MS: u64 = 1_000;

/// Upper bound for a single publish attempt (milliseconds).
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 2_000;

// ============================================================================
// Card Decoder
// ============================================================================

/// Maximum gap between key events of one card read (milliseconds).
///
/// USB readers in keyboard-emulation mode type a whole UID in a few tens of
/// milliseconds; a longer pause means the previous partial read is stale.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Minimum distinct key codes for a device to qualify as a card reader.
///
/// Covers the ten digit keys every reader needs to type a UID.
pub const MIN_READER_KEY_CODES: usize = 10;

/// Device-name hints used by the device locator (matched case-insensitively).
pub const READER_NAME_HINTS: [&str; 5] = ["rfid", "card", "reader", "hid", "usb"];

/// Reopen attempts after a device read error before falling back to simulation.
pub const DEFAULT_REOPEN_ATTEMPTS: u32 = 3;

/// Pause between reopen attempts (milliseconds).
pub const DEFAULT_REOPEN_DELAY_MS: u64 = 5_000;

/// Bounded join timeout for background loops (milliseconds).
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 1_500;

/// Length of a generated simulation identifier.
pub const SIMULATED_UID_LENGTH: usize = 8;

// ============================================================================
// Card Identifier Limits
// ============================================================================

/// Maximum length of a card identifier.
pub const MAX_CARD_IDENTIFIER_LENGTH: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_bounds_are_consistent() {
        assert!(DEFAULT_RECONNECT_INITIAL_MS < DEFAULT_RECONNECT_MAX_MS);
        assert!(DEFAULT_RECONNECT_FACTOR > 1.0);
    }

    #[test]
    fn test_reader_hints_are_lowercase() {
        for hint in READER_NAME_HINTS {
            assert_eq!(hint, hint.to_lowercase());
        }
    }

    #[test]
    fn test_simulated_uid_fits_limit() {
        assert!(SIMULATED_UID_LENGTH <= MAX_CARD_IDENTIFIER_LENGTH);
    }
}
