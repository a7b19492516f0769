//! Scriptable input backend.
//!
//! [`MockInputBackend`] plays the role of the kernel input subsystem and
//! [`MockInputHandle`] drives it: register devices, make opens fail, type
//! card UIDs, or unplug the open device.

use crate::{
    HardwareError, Result,
    devices::AnyKeySource,
    keymap,
    traits::{InputBackend, KeyEventSource},
    types::{InputDeviceInfo, KeyCode, KeyState, RawKeyEvent},
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Internal event type for mock sources.
#[derive(Debug, Clone)]
enum SourceEvent {
    Key(RawKeyEvent),
    Fault(String),
}

#[derive(Debug)]
struct MockState {
    devices: Vec<InputDeviceInfo>,
    supported: bool,
    failing_opens: u32,
    open_count: u32,
    /// Sender for the most recently opened source.
    active: Option<(PathBuf, mpsc::UnboundedSender<SourceEvent>)>,
}

/// Mock input backend.
///
/// Cloning shares the same simulated host.
///
/// # Examples
///
/// ```
/// use consultease_hardware::mock::MockInputBackend;
/// use consultease_hardware::traits::{InputBackend, KeyEventSource};
/// use consultease_hardware::types::{DeviceCapabilities, InputDeviceInfo};
/// use std::path::Path;
///
/// #[tokio::main]
/// async fn main() -> consultease_hardware::Result<()> {
///     let (backend, handle) = MockInputBackend::new();
///     handle.add_device(InputDeviceInfo::new(
///         "/dev/input/event3",
///         "USB RFID Reader",
///         DeviceCapabilities::keyboard(40),
///     ));
///
///     let mut source = backend.open(Path::new("/dev/input/event3"))?;
///     handle.type_card("04AB")?;
///
///     let first = source.next_event().await?;
///     assert_eq!(first.code.code(), 11); // KEY_0
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockInputBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockInputBackend {
    /// Create an empty simulated host and its controlling handle.
    pub fn new() -> (Self, MockInputHandle) {
        let state = Arc::new(Mutex::new(MockState {
            devices: Vec::new(),
            supported: true,
            failing_opens: 0,
            open_count: 0,
            active: None,
        }));

        (
            Self {
                state: Arc::clone(&state),
            },
            MockInputHandle { state },
        )
    }
}

impl InputBackend for MockInputBackend {
    fn backend_name(&self) -> &'static str {
        "mock"
    }

    fn is_supported(&self) -> bool {
        self.state.lock().supported
    }

    fn enumerate(&self) -> Result<Vec<InputDeviceInfo>> {
        let state = self.state.lock();
        if !state.supported {
            return Err(HardwareError::unsupported("input device enumeration"));
        }
        Ok(state.devices.clone())
    }

    fn open(&self, path: &Path) -> Result<AnyKeySource> {
        let mut state = self.state.lock();
        state.open_count += 1;

        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(HardwareError::initialization_failed(format!(
                "simulated open failure for {}",
                path.display()
            )));
        }

        let name = state
            .devices
            .iter()
            .find(|d| d.path == path)
            .map(|d| d.name.clone())
            .ok_or_else(|| {
                HardwareError::from(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                ))
            })?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        state.active = Some((path.to_path_buf(), event_tx));

        Ok(AnyKeySource::Mock(MockKeySource { event_rx, name }))
    }
}

/// Key source returned by [`MockInputBackend::open`].
#[derive(Debug)]
pub struct MockKeySource {
    event_rx: mpsc::UnboundedReceiver<SourceEvent>,
    name: String,
}

impl KeyEventSource for MockKeySource {
    async fn next_event(&mut self) -> Result<RawKeyEvent> {
        match self.event_rx.recv().await {
            Some(SourceEvent::Key(event)) => Ok(event),
            Some(SourceEvent::Fault(message)) => Err(HardwareError::communication(message)),
            None => Err(HardwareError::disconnected(self.name.clone())),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle for controlling a [`MockInputBackend`].
#[derive(Debug, Clone)]
pub struct MockInputHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockInputHandle {
    /// Plug in a device.
    pub fn add_device(&self, info: InputDeviceInfo) {
        self.state.lock().devices.push(info);
    }

    /// Unplug a device. If it is the open one, its source reports a disconnect.
    pub fn remove_device(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.state.lock();
        state.devices.retain(|d| d.path != path);
        if state.active.as_ref().is_some_and(|(p, _)| p == path) {
            state.active = None;
        }
    }

    /// Toggle whether the input subsystem appears to exist.
    pub fn set_supported(&self, supported: bool) {
        self.state.lock().supported = supported;
    }

    /// Make the next `count` opens fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.state.lock().failing_opens = count;
    }

    /// Total open attempts, including failed ones.
    pub fn open_count(&self) -> u32 {
        self.state.lock().open_count
    }

    /// Whether a source is currently open and still listening.
    pub fn is_open(&self) -> bool {
        self.state
            .lock()
            .active
            .as_ref()
            .is_some_and(|(_, tx)| !tx.is_closed())
    }

    /// Path of the most recently opened device, if still open.
    pub fn open_path(&self) -> Option<PathBuf> {
        self.state
            .lock()
            .active
            .as_ref()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(p, _)| p.clone())
    }

    /// Inject a raw event into the open source.
    ///
    /// # Errors
    ///
    /// Returns an error if no source is open.
    pub fn send(&self, event: RawKeyEvent) -> Result<()> {
        self.dispatch(SourceEvent::Key(event))
    }

    /// Inject a key-down event stamped now.
    ///
    /// # Errors
    ///
    /// Returns an error if no source is open.
    pub fn press(&self, code: KeyCode) -> Result<()> {
        self.send(RawKeyEvent::pressed(code))
    }

    /// Type `uid` the way a reader does: press and release each key, then Enter.
    ///
    /// # Errors
    ///
    /// Returns an error if no source is open or `uid` holds a character the
    /// reader keymap cannot produce.
    pub fn type_card(&self, uid: &str) -> Result<()> {
        let mut codes = Vec::with_capacity(uid.len() + 1);
        for ch in uid.chars() {
            let code = keymap::encode(ch).ok_or_else(|| {
                HardwareError::other(format!("character {ch:?} cannot be typed by a reader"))
            })?;
            codes.push(code);
        }
        codes.push(KeyCode::KEY_ENTER);

        for code in codes {
            self.send(RawKeyEvent::pressed(code))?;
            self.send(RawKeyEvent::released(code))?;
        }
        Ok(())
    }

    /// Make the open source fail its next read.
    ///
    /// # Errors
    ///
    /// Returns an error if no source is open.
    pub fn inject_fault(&self, message: impl Into<String>) -> Result<()> {
        self.dispatch(SourceEvent::Fault(message.into()))
    }

    fn dispatch(&self, event: SourceEvent) -> Result<()> {
        let state = self.state.lock();
        let (path, tx) = state
            .active
            .as_ref()
            .ok_or_else(|| HardwareError::disconnected("no mock device open"))?;
        tx.send(event)
            .map_err(|_| HardwareError::disconnected(path.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceCapabilities;

    const READER: &str = "/dev/input/event5";

    fn backend_with_reader() -> (MockInputBackend, MockInputHandle) {
        let (backend, handle) = MockInputBackend::new();
        handle.add_device(InputDeviceInfo::new(
            READER,
            "HID RFID Reader",
            DeviceCapabilities::keyboard(48),
        ));
        (backend, handle)
    }

    #[tokio::test]
    async fn test_type_card_emits_press_release_pairs() {
        let (backend, handle) = backend_with_reader();
        let mut source = backend.open(Path::new(READER)).unwrap();

        handle.type_card("1A").unwrap();

        let mut seen = Vec::new();
        for _ in 0..6 {
            let event = source.next_event().await.unwrap();
            seen.push((event.code, event.state));
        }
        assert_eq!(
            seen,
            vec![
                (KeyCode::KEY_1, KeyState::Pressed),
                (KeyCode::KEY_1, KeyState::Released),
                (KeyCode::KEY_A, KeyState::Pressed),
                (KeyCode::KEY_A, KeyState::Released),
                (KeyCode::KEY_ENTER, KeyState::Pressed),
                (KeyCode::KEY_ENTER, KeyState::Released),
            ]
        );
    }

    #[test]
    fn test_type_card_rejects_untypeable() {
        let (backend, handle) = backend_with_reader();
        let _source = backend.open(Path::new(READER)).unwrap();
        assert!(handle.type_card("12-34").is_err());
    }

    #[test]
    fn test_send_without_open_source() {
        let (_backend, handle) = backend_with_reader();
        assert!(matches!(
            handle.press(KeyCode::KEY_1),
            Err(HardwareError::Disconnected { .. })
        ));
    }

    #[test]
    fn test_open_unknown_path() {
        let (backend, handle) = backend_with_reader();
        assert!(backend.open(Path::new("/dev/input/event99")).is_err());
        assert_eq!(handle.open_count(), 1);
        assert!(!handle.is_open());
    }

    #[test]
    fn test_failing_opens() {
        let (backend, handle) = backend_with_reader();
        handle.fail_next_opens(2);

        assert!(backend.open(Path::new(READER)).is_err());
        assert!(backend.open(Path::new(READER)).is_err());
        let source = backend.open(Path::new(READER)).unwrap();
        assert_eq!(handle.open_count(), 3);
        assert_eq!(handle.open_path(), Some(PathBuf::from(READER)));

        // Dropping the source closes it
        drop(source);
        assert!(!handle.is_open());
        assert_eq!(handle.open_path(), None);
    }

    #[tokio::test]
    async fn test_remove_device_disconnects_source() {
        let (backend, handle) = backend_with_reader();
        let mut source = backend.open(Path::new(READER)).unwrap();

        handle.remove_device(READER);

        let err = source.next_event().await.unwrap_err();
        assert!(err.is_disconnect());
        assert!(backend.enumerate().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_fault() {
        let (backend, handle) = backend_with_reader();
        let mut source = backend.open(Path::new(READER)).unwrap();

        handle.inject_fault("EIO").unwrap();
        assert!(matches!(
            source.next_event().await,
            Err(HardwareError::CommunicationError { .. })
        ));
    }

    #[test]
    fn test_unsupported_host() {
        let (backend, handle) = MockInputBackend::new();
        handle.set_supported(false);
        assert!(!backend.is_supported());
        assert!(backend.enumerate().is_err());
    }
}
