//! Linux evdev input backend.
//!
//! Devices are enumerated from `/dev/input/event*` and read through the
//! `evdev` crate's Tokio event stream. Only `EV_KEY` events are forwarded;
//! synchronization and scan-code events are skipped here.

use crate::{
    HardwareError, Result,
    devices::AnyKeySource,
    traits::{InputBackend, KeyEventSource},
    types::{DeviceCapabilities, InputDeviceInfo, KeyCode, KeyState, RawKeyEvent},
};
use evdev::{Device, EventStream, EventType};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::trace;

/// Backend over the kernel evdev interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvdevBackend;

fn describe(path: PathBuf, device: &Device) -> InputDeviceInfo {
    let events = device.supported_events();
    let capabilities = DeviceCapabilities {
        keys: events.contains(EventType::KEY),
        relative: events.contains(EventType::RELATIVE),
        absolute: events.contains(EventType::ABSOLUTE),
        key_codes: device
            .supported_keys()
            .map_or(0, |keys| keys.iter().count()),
    };

    InputDeviceInfo::new(path, device.name().unwrap_or("unnamed device"), capabilities)
}

impl InputBackend for EvdevBackend {
    fn backend_name(&self) -> &'static str {
        "evdev"
    }

    fn is_supported(&self) -> bool {
        Path::new("/dev/input").is_dir()
    }

    fn enumerate(&self) -> Result<Vec<InputDeviceInfo>> {
        Ok(evdev::enumerate()
            .map(|(path, device)| describe(path, &device))
            .collect())
    }

    fn open(&self, path: &Path) -> Result<AnyKeySource> {
        let device = Device::open(path).map_err(|e| {
            HardwareError::initialization_failed(format!("{}: {e}", path.display()))
        })?;
        let name = device.name().unwrap_or("unnamed device").to_string();
        let stream = device.into_event_stream()?;

        Ok(AnyKeySource::Evdev(EvdevKeySource {
            stream,
            name,
            path: path.to_path_buf(),
        }))
    }
}

/// Opened evdev device.
pub struct EvdevKeySource {
    stream: EventStream,
    name: String,
    path: PathBuf,
}

impl fmt::Debug for EvdevKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvdevKeySource")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl KeyEventSource for EvdevKeySource {
    async fn next_event(&mut self) -> Result<RawKeyEvent> {
        loop {
            let event = self.stream.next_event().await?;
            if event.event_type() != EventType::KEY {
                continue;
            }

            trace!(code = event.code(), value = event.value(), "evdev key event");
            return Ok(RawKeyEvent::new(
                KeyCode(event.code()),
                KeyState::from_value(event.value()),
                Instant::now(),
            ));
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
