//! Card reader discovery.
//!
//! Keyboard-emulating readers show up as ordinary keyboards, so the locator
//! picks the first device whose name hints at a reader and which advertises
//! enough keys to type a UID. Devices are inspected in enumeration order.

use crate::{
    HardwareError, Result,
    devices::AnyInputBackend,
    traits::InputBackend,
    types::InputDeviceInfo,
};
use consultease_core::constants::{MIN_READER_KEY_CODES, READER_NAME_HINTS};
use tracing::{debug, info, warn};

/// Heuristic selector for the card reader input device.
///
/// # Examples
///
/// ```
/// use consultease_hardware::locator::DeviceLocator;
/// use consultease_hardware::types::{DeviceCapabilities, InputDeviceInfo};
///
/// let devices = vec![
///     InputDeviceInfo::new("/dev/input/event0", "Power Button", DeviceCapabilities::keyboard(1)),
///     InputDeviceInfo::new("/dev/input/event3", "Sycreader USB Reader", DeviceCapabilities::keyboard(112)),
/// ];
///
/// let locator = DeviceLocator::default();
/// let reader = locator.select(&devices).unwrap();
/// assert_eq!(reader.name, "Sycreader USB Reader");
/// ```
#[derive(Debug, Clone)]
pub struct DeviceLocator {
    name_hints: Vec<String>,
    min_key_codes: usize,
}

impl Default for DeviceLocator {
    fn default() -> Self {
        Self {
            name_hints: READER_NAME_HINTS.iter().map(|h| h.to_string()).collect(),
            min_key_codes: MIN_READER_KEY_CODES,
        }
    }
}

impl DeviceLocator {
    /// Locator with custom hints (matched case-insensitively) and key threshold.
    pub fn new<I, S>(name_hints: I, min_key_codes: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name_hints: name_hints
                .into_iter()
                .map(|h| h.as_ref().to_lowercase())
                .collect(),
            min_key_codes,
        }
    }

    /// Whether `device` looks like a card reader.
    pub fn is_candidate(&self, device: &InputDeviceInfo) -> bool {
        let name = device.name.to_lowercase();
        let caps = &device.capabilities;
        caps.keys
            && caps.key_codes >= self.min_key_codes
            && self.name_hints.iter().any(|hint| name.contains(hint.as_str()))
    }

    /// First candidate in enumeration order.
    pub fn select<'a>(&self, devices: &'a [InputDeviceInfo]) -> Option<&'a InputDeviceInfo> {
        devices.iter().find(|d| self.is_candidate(d))
    }

    /// Enumerate the backend and pick the reader.
    ///
    /// Every inspected device is logged.
    ///
    /// # Errors
    ///
    /// Returns an error if enumeration fails or no device qualifies.
    pub fn locate(&self, backend: &AnyInputBackend) -> Result<InputDeviceInfo> {
        let devices = backend.enumerate()?;

        for device in &devices {
            info!(
                candidate = self.is_candidate(device),
                key_codes = device.capabilities.key_codes,
                "Input device: {device}"
            );
        }

        match self.select(&devices) {
            Some(device) => {
                info!(
                    path = %device.path.display(),
                    name = %device.name,
                    "Found card reader"
                );
                Ok(device.clone())
            }
            None => {
                warn!(inspected = devices.len(), "No card reader found among input devices");
                Err(HardwareError::device_not_found(format!(
                    "{} input devices inspected",
                    devices.len()
                )))
            }
        }
    }

    /// Every input device with its capability labels, for troubleshooting.
    ///
    /// # Errors
    ///
    /// Returns an error if enumeration fails.
    pub fn describe_all(&self, backend: &AnyInputBackend) -> Result<Vec<InputDeviceInfo>> {
        let devices = backend.enumerate()?;
        for device in &devices {
            debug!("Input device: {device}");
        }
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInputBackend;
    use crate::types::DeviceCapabilities;
    use rstest::rstest;

    fn keyboard(path: &str, name: &str, keys: usize) -> InputDeviceInfo {
        InputDeviceInfo::new(path, name, DeviceCapabilities::keyboard(keys))
    }

    #[rstest]
    #[case("USB RFID Reader", 40, true)]
    #[case("HID 413d:2107", 112, true)]
    #[case("Generic Card Terminal", 10, true)]
    #[case("usb keyboard", 9, false)] // too few keys
    #[case("AT Translated Set 2 keyboard", 112, false)] // no hint
    #[case("", 112, false)]
    fn test_is_candidate(#[case] name: &str, #[case] keys: usize, #[case] expected: bool) {
        let locator = DeviceLocator::default();
        assert_eq!(
            locator.is_candidate(&keyboard("/dev/input/event1", name, keys)),
            expected
        );
    }

    #[test]
    fn test_keyless_device_is_never_candidate() {
        let locator = DeviceLocator::default();
        let mouse = InputDeviceInfo::new(
            "/dev/input/event2",
            "USB Optical Mouse",
            DeviceCapabilities {
                relative: true,
                key_codes: 16,
                ..DeviceCapabilities::default()
            },
        );
        assert!(!locator.is_candidate(&mouse));
    }

    #[test]
    fn test_select_first_in_order() {
        let devices = vec![
            keyboard("/dev/input/event0", "Power Button", 1),
            keyboard("/dev/input/event4", "RFID Reader A", 40),
            keyboard("/dev/input/event5", "RFID Reader B", 40),
        ];
        let locator = DeviceLocator::default();
        assert_eq!(
            locator.select(&devices).unwrap().path.to_str(),
            Some("/dev/input/event4")
        );
    }

    #[test]
    fn test_select_none() {
        let locator = DeviceLocator::default();
        assert!(locator.select(&[]).is_none());
    }

    #[test]
    fn test_custom_hints() {
        let locator = DeviceLocator::new(["Sycreader"], 5);
        assert!(locator.is_candidate(&keyboard("/dev/input/event1", "SYCREADER 125k", 6)));
        assert!(!locator.is_candidate(&keyboard("/dev/input/event1", "USB RFID", 60)));
    }

    #[test]
    fn test_locate_via_backend() {
        let (backend, handle) = MockInputBackend::new();
        handle.add_device(keyboard("/dev/input/event0", "Power Button", 1));
        handle.add_device(keyboard("/dev/input/event7", "IC Card Reader", 30));
        let backend = AnyInputBackend::Mock(backend);

        let locator = DeviceLocator::default();
        let found = locator.locate(&backend).unwrap();
        assert_eq!(found.name, "IC Card Reader");

        handle.remove_device("/dev/input/event7");
        assert!(matches!(
            locator.locate(&backend),
            Err(HardwareError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn test_describe_all_lists_everything() {
        let (backend, handle) = MockInputBackend::new();
        handle.add_device(keyboard("/dev/input/event0", "Power Button", 1));
        handle.add_device(InputDeviceInfo::new(
            "/dev/input/event1",
            "Touchscreen",
            DeviceCapabilities {
                absolute: true,
                ..DeviceCapabilities::default()
            },
        ));
        let devices = DeviceLocator::default()
            .describe_all(&AnyInputBackend::Mock(backend))
            .unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[1].capabilities.labels(), vec!["touch"]);
    }
}
