//! Environment-driven settings.
//!
//! The bridge is configured exclusively through environment variables (see
//! [`constants`](crate::constants) for the keys). Values are collected with the
//! `config` crate's [`Environment`] source; anything absent falls back to the
//! documented defaults.
//!
//! # Examples
//!
//! ```
//! use consultease_core::config::Settings;
//! use std::collections::HashMap;
//!
//! let mut env = HashMap::new();
//! env.insert("MQTT_BROKER_HOST".to_string(), "broker.local".to_string());
//! env.insert("RFID_SIMULATION_MODE".to_string(), "true".to_string());
//!
//! let settings = Settings::from_source(env).unwrap();
//! assert_eq!(settings.broker.host, "broker.local");
//! assert_eq!(settings.broker.port, 1883);
//! assert!(settings.rfid.simulation_mode);
//! ```

use crate::{
    Result,
    constants::{
        DEFAULT_BROKER_HOST, DEFAULT_BROKER_PORT, DEFAULT_CLIENT_ID, ENV_BROKER_HOST,
        ENV_BROKER_PORT, ENV_CLIENT_ID, ENV_DEVICE_PATH, ENV_PASSWORD, ENV_SIMULATION_MODE,
        ENV_USERNAME,
    },
    error::Error,
};
use config::{Config, Environment};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Broker connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Broker host name or address.
    pub host: String,

    /// Broker TCP port.
    pub port: u16,

    /// Client identifier announced to the broker.
    pub client_id: String,

    /// Optional user name.
    pub username: Option<String>,

    /// Optional password.
    pub password: Option<String>,
}

impl BrokerSettings {
    /// Credentials to pass to the broker, only when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// `host:port` for log lines.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_BROKER_HOST.to_string(),
            port: DEFAULT_BROKER_PORT,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            username: None,
            password: None,
        }
    }
}

// Manual impl keeps the password out of logs.
impl std::fmt::Debug for BrokerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Card reader settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RfidSettings {
    /// Explicit input device path; `None` enables auto-detection.
    pub device_path: Option<PathBuf>,

    /// Force simulation mode regardless of available hardware.
    pub simulation_mode: bool,
}

/// All settings consumed by the bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub rfid: RfidSettings,
}

/// Raw view of the recognized environment keys.
///
/// The `config` crate lowercases environment keys, hence the field names.
#[derive(Debug, Default, Deserialize)]
struct RawEnvironment {
    mqtt_broker_host: Option<String>,
    mqtt_broker_port: Option<String>,
    mqtt_client_id: Option<String>,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    rfid_device_path: Option<String>,
    rfid_simulation_mode: Option<String>,
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    /// Returns an error if a recognized variable holds an unparsable value
    /// (for example a non-numeric port).
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::default())
    }

    /// Load settings from an explicit key/value map instead of the process
    /// environment. Keys use the same names as the environment variables.
    ///
    /// # Errors
    /// Same as [`Settings::from_env`].
    pub fn from_source(vars: HashMap<String, String>) -> Result<Self> {
        Self::load(Environment::default().source(Some(vars.into_iter().collect())))
    }

    fn load(source: Environment) -> Result<Self> {
        let raw: RawEnvironment = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawEnvironment) -> Result<Self> {
        let defaults = BrokerSettings::default();

        let port = match present(ENV_BROKER_PORT, raw.mqtt_broker_port) {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|e| Error::InvalidConfigValue {
                    key: ENV_BROKER_PORT.to_string(),
                    message: format!("{value:?}: {e}"),
                })?,
            None => defaults.port,
        };

        let simulation_mode = match present(ENV_SIMULATION_MODE, raw.rfid_simulation_mode) {
            Some(value) => parse_flag(&value).ok_or_else(|| Error::InvalidConfigValue {
                key: ENV_SIMULATION_MODE.to_string(),
                message: format!("{value:?} is not a boolean"),
            })?,
            None => false,
        };

        Ok(Settings {
            broker: BrokerSettings {
                host: present(ENV_BROKER_HOST, raw.mqtt_broker_host).unwrap_or(defaults.host),
                port,
                client_id: present(ENV_CLIENT_ID, raw.mqtt_client_id).unwrap_or(defaults.client_id),
                username: present(ENV_USERNAME, raw.mqtt_username),
                password: present(ENV_PASSWORD, raw.mqtt_password),
            },
            rfid: RfidSettings {
                device_path: present(ENV_DEVICE_PATH, raw.rfid_device_path).map(PathBuf::from),
                simulation_mode,
            },
        })
    }
}

/// `value` unless unset or blank. Blank counts as unset.
fn present(key: &str, value: Option<String>) -> Option<String> {
    let value = value.filter(|v| !v.trim().is_empty());
    if value.is_none() {
        debug!(key, "Variable unset, using default");
    }
    value
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
