//! Enum wrappers for input backend dispatch.
//!
//! Native `async fn` in traits are not object-safe, so instead of
//! `Box<dyn KeyEventSource>` the decoder holds one of these enums. The evdev
//! variants only exist on Linux; elsewhere the platform default is
//! [`AnyInputBackend::Unsupported`] and the decoder runs in simulation.
//!
//! # Examples
//!
//! ```
//! use consultease_hardware::devices::AnyInputBackend;
//! use consultease_hardware::mock::MockInputBackend;
//! use consultease_hardware::traits::InputBackend;
//!
//! let (backend, _handle) = MockInputBackend::new();
//! let backend = AnyInputBackend::Mock(backend);
//! assert!(backend.is_supported());
//! assert_eq!(backend.backend_name(), "mock");
//! ```

#[cfg(target_os = "linux")]
use crate::evdev_backend::{EvdevBackend, EvdevKeySource};
use crate::mock::{MockInputBackend, MockKeySource};
use crate::traits::{InputBackend, KeyEventSource};
use crate::types::{InputDeviceInfo, RawKeyEvent};
use crate::{HardwareError, Result};
use std::path::Path;

/// Enum wrapper for opened key event sources.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyKeySource {
    /// Channel-driven source for tests and development.
    Mock(MockKeySource),

    /// Kernel evdev device.
    #[cfg(target_os = "linux")]
    Evdev(EvdevKeySource),
}

impl KeyEventSource for AnyKeySource {
    async fn next_event(&mut self) -> Result<RawKeyEvent> {
        match self {
            Self::Mock(source) => source.next_event().await,
            #[cfg(target_os = "linux")]
            Self::Evdev(source) => source.next_event().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Mock(source) => source.name(),
            #[cfg(target_os = "linux")]
            Self::Evdev(source) => source.name(),
        }
    }
}

/// Enum wrapper for input backends.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyInputBackend {
    /// Scriptable backend for tests and development.
    Mock(MockInputBackend),

    /// Linux evdev.
    #[cfg(target_os = "linux")]
    Evdev(EvdevBackend),

    /// No input subsystem on this platform.
    Unsupported,
}

impl AnyInputBackend {
    /// Backend for the current platform: evdev on Linux, otherwise none.
    pub fn platform_default() -> Self {
        #[cfg(target_os = "linux")]
        {
            Self::Evdev(EvdevBackend)
        }
        #[cfg(not(target_os = "linux"))]
        {
            Self::Unsupported
        }
    }
}

impl Default for AnyInputBackend {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl InputBackend for AnyInputBackend {
    fn backend_name(&self) -> &'static str {
        match self {
            Self::Mock(backend) => backend.backend_name(),
            #[cfg(target_os = "linux")]
            Self::Evdev(backend) => backend.backend_name(),
            Self::Unsupported => "unsupported",
        }
    }

    fn is_supported(&self) -> bool {
        match self {
            Self::Mock(backend) => backend.is_supported(),
            #[cfg(target_os = "linux")]
            Self::Evdev(backend) => backend.is_supported(),
            Self::Unsupported => false,
        }
    }

    fn enumerate(&self) -> Result<Vec<InputDeviceInfo>> {
        match self {
            Self::Mock(backend) => backend.enumerate(),
            #[cfg(target_os = "linux")]
            Self::Evdev(backend) => backend.enumerate(),
            Self::Unsupported => Err(HardwareError::unsupported("input device enumeration")),
        }
    }

    fn open(&self, path: &Path) -> Result<AnyKeySource> {
        match self {
            Self::Mock(backend) => backend.open(path),
            #[cfg(target_os = "linux")]
            Self::Evdev(backend) => backend.open(path),
            Self::Unsupported => Err(HardwareError::unsupported("input device access")),
        }
    }
}
