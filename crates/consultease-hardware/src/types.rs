//! Common types shared by input backends, the locator, and the decoder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// Linux input key code (`KEY_*` from `input-event-codes.h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const KEY_1: KeyCode = KeyCode(2);
    pub const KEY_2: KeyCode = KeyCode(3);
    pub const KEY_3: KeyCode = KeyCode(4);
    pub const KEY_4: KeyCode = KeyCode(5);
    pub const KEY_5: KeyCode = KeyCode(6);
    pub const KEY_6: KeyCode = KeyCode(7);
    pub const KEY_7: KeyCode = KeyCode(8);
    pub const KEY_8: KeyCode = KeyCode(9);
    pub const KEY_9: KeyCode = KeyCode(10);
    pub const KEY_0: KeyCode = KeyCode(11);
    pub const KEY_E: KeyCode = KeyCode(18);
    pub const KEY_ENTER: KeyCode = KeyCode(28);
    pub const KEY_A: KeyCode = KeyCode(30);
    pub const KEY_D: KeyCode = KeyCode(32);
    pub const KEY_F: KeyCode = KeyCode(33);
    pub const KEY_LEFTSHIFT: KeyCode = KeyCode(42);
    pub const KEY_C: KeyCode = KeyCode(46);
    pub const KEY_B: KeyCode = KeyCode(48);
    pub const KEY_KP7: KeyCode = KeyCode(71);
    pub const KEY_KP8: KeyCode = KeyCode(72);
    pub const KEY_KP9: KeyCode = KeyCode(73);
    pub const KEY_KP4: KeyCode = KeyCode(75);
    pub const KEY_KP5: KeyCode = KeyCode(76);
    pub const KEY_KP6: KeyCode = KeyCode(77);
    pub const KEY_KP1: KeyCode = KeyCode(79);
    pub const KEY_KP2: KeyCode = KeyCode(80);
    pub const KEY_KP3: KeyCode = KeyCode(81);
    pub const KEY_KP0: KeyCode = KeyCode(82);
    pub const KEY_KPENTER: KeyCode = KeyCode(96);

    /// Raw numeric code.
    pub fn code(self) -> u16 {
        self.0
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key#{}", self.0)
    }
}

/// Key transition reported by the kernel (`EV_KEY` value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Released,
    Pressed,
    /// Autorepeat while held.
    Repeat,
}

impl KeyState {
    /// Map the raw `EV_KEY` value; anything but 0 or 1 counts as repeat.
    pub fn from_value(value: i32) -> Self {
        match value {
            0 => Self::Released,
            1 => Self::Pressed,
            _ => Self::Repeat,
        }
    }
}

/// One key event read from an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    pub code: KeyCode,
    pub state: KeyState,
    /// Monotonic arrival time, used for debouncing.
    pub timestamp: Instant,
}

impl RawKeyEvent {
    pub fn new(code: KeyCode, state: KeyState, timestamp: Instant) -> Self {
        Self {
            code,
            state,
            timestamp,
        }
    }

    /// Key-down event stamped now.
    pub fn pressed(code: KeyCode) -> Self {
        Self::new(code, KeyState::Pressed, Instant::now())
    }

    /// Key-up event stamped now.
    pub fn released(code: KeyCode) -> Self {
        Self::new(code, KeyState::Released, Instant::now())
    }
}

/// Event classes and key coverage advertised by an input device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    /// Emits `EV_KEY` events.
    pub keys: bool,

    /// Emits `EV_REL` events (mice, trackballs).
    pub relative: bool,

    /// Emits `EV_ABS` events (touchscreens, touchpads).
    pub absolute: bool,

    /// Number of distinct key codes the device supports.
    pub key_codes: usize,
}

impl DeviceCapabilities {
    /// Keyboard-like device with `key_codes` keys.
    pub fn keyboard(key_codes: usize) -> Self {
        Self {
            keys: true,
            key_codes,
            ..Self::default()
        }
    }

    /// Human-readable capability labels for diagnostics.
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.keys {
            labels.push("keyboard");
        }
        if self.relative {
            labels.push("pointer");
        }
        if self.absolute {
            labels.push("touch");
        }
        labels
    }
}

/// Description of one input device on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDeviceInfo {
    /// Device node, e.g. `/dev/input/event3`.
    pub path: PathBuf,

    /// Name reported by the driver.
    pub name: String,

    pub capabilities: DeviceCapabilities,
}

impl InputDeviceInfo {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        capabilities: DeviceCapabilities,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            capabilities,
        }
    }
}

impl fmt::Display for InputDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) [{}]",
            self.path.display(),
            self.name,
            self.capabilities.labels().join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, KeyState::Released)]
    #[case(1, KeyState::Pressed)]
    #[case(2, KeyState::Repeat)]
    fn test_key_state_from_value(#[case] value: i32, #[case] expected: KeyState) {
        assert_eq!(KeyState::from_value(value), expected);
    }

    #[test]
    fn test_capability_labels() {
        let caps = DeviceCapabilities {
            keys: true,
            relative: false,
            absolute: true,
            key_codes: 12,
        };
        assert_eq!(caps.labels(), vec!["keyboard", "touch"]);
        assert!(DeviceCapabilities::default().labels().is_empty());
    }

    #[test]
    fn test_device_info_display() {
        let info = InputDeviceInfo::new(
            "/dev/input/event4",
            "USB RFID Reader",
            DeviceCapabilities::keyboard(40),
        );
        assert_eq!(
            info.to_string(),
            "/dev/input/event4 (USB RFID Reader) [keyboard]"
        );
    }

    #[test]
    fn test_device_info_serialization() {
        let info = InputDeviceInfo::new("/dev/input/event0", "Power Button", DeviceCapabilities::keyboard(1));
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["name"], "Power Button");
        assert_eq!(json["capabilities"]["key_codes"], 1);
    }
}
