//! Error types for input-device operations.
//!
//! Failures raised while enumerating, opening, or reading the kernel input
//! devices that back the card reader. None of these escape the decoder's
//! public API: the decoder logs them and degrades to simulation instead.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during input-device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device vanished or its event stream closed.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// No device matched the reader heuristics.
    #[error("No card reader found: {message}")]
    DeviceNotFound { message: String },

    /// Input subsystem is not available on this platform.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Device read failed mid-stream.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Device could not be opened.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new device-not-found error.
    pub fn device_not_found(message: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            message: message.into(),
        }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Whether the error means the device is gone rather than misbehaving.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Disconnected { .. } => true,
            Self::Io(e) => matches!(
                e.raw_os_error(),
                // ENODEV, ENXIO
                Some(19) | Some(6)
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("/dev/input/event3");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Device disconnected: /dev/input/event3");
        assert!(error.is_disconnect());
    }

    #[test]
    fn test_device_not_found_error() {
        let error = HardwareError::device_not_found("3 devices inspected");
        assert_eq!(error.to_string(), "No card reader found: 3 devices inspected");
        assert!(!error.is_disconnect());
    }

    #[test]
    fn test_unsupported_error() {
        let error = HardwareError::unsupported("evdev");
        assert_eq!(error.to_string(), "Unsupported operation: evdev");
    }

    #[test]
    fn test_io_disconnect_detection() {
        let gone = HardwareError::from(std::io::Error::from_raw_os_error(19));
        assert!(gone.is_disconnect());

        let denied = HardwareError::from(std::io::Error::from(
            std::io::ErrorKind::PermissionDenied,
        ));
        assert!(!denied.is_disconnect());
    }
}
