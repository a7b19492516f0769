//! Card-event decoder.
//!
//! [`CardDecoder`] owns the background loop that turns reader keystrokes into
//! [`CardIdentifier`]s and fans them out to registered callbacks.
//!
//! # Modes
//!
//! The mode is chosen when [`CardDecoder::start`] runs:
//!
//! 1. simulation when explicitly requested;
//! 2. otherwise hardware, if the input subsystem exists, a reader can be
//!    located (or a path was configured) and opened;
//! 3. any failure along the way downgrades to simulation.
//!
//! In hardware mode a read error triggers a bounded number of reopen attempts
//! before the decoder gives up on the device and continues in simulation.
//! Simulation performs no I/O; identifiers are injected with
//! [`CardDecoder::simulate_card_read`], which works in every mode.
//!
//! # Examples
//!
//! ```
//! use consultease_hardware::decoder::{CardDecoder, DecoderConfig, DecoderMode, SimulationReason};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = DecoderConfig {
//!         simulation_mode: true,
//!         ..DecoderConfig::default()
//!     };
//!     let decoder = CardDecoder::new(config);
//!
//!     let subscription = decoder.register_callback(|card| {
//!         println!("scanned {card}");
//!         Ok(())
//!     });
//!
//!     decoder.start();
//!     assert_eq!(
//!         decoder.mode(),
//!         DecoderMode::Simulation { reason: SimulationReason::Requested }
//!     );
//!
//!     let card = decoder.simulate_card_read(None);
//!     assert_eq!(card.len(), 8);
//!
//!     decoder.unregister_callback(subscription);
//!     decoder.stop().await;
//! }
//! ```

use crate::{
    Result,
    devices::{AnyInputBackend, AnyKeySource},
    locator::DeviceLocator,
    session::DecoderSession,
    traits::{InputBackend, KeyEventSource},
};
use consultease_core::{
    CallbackRegistry, CardIdentifier, Subscription,
    config::RfidSettings,
    constants::{
        DEFAULT_DEBOUNCE_MS, DEFAULT_JOIN_TIMEOUT_MS, DEFAULT_REOPEN_ATTEMPTS,
        DEFAULT_REOPEN_DELAY_MS, SIMULATED_UID_LENGTH,
    },
};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Decoder tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Explicit device path; `None` runs the device locator.
    pub device_path: Option<PathBuf>,

    /// Skip hardware entirely.
    pub simulation_mode: bool,

    /// Maximum gap between key events of one read.
    pub debounce: Duration,

    /// Reopen attempts after a read error before giving up on the device.
    pub reopen_attempts: u32,

    /// Pause between reopen attempts.
    pub reopen_delay: Duration,

    /// How long [`CardDecoder::stop`] waits for the loop before aborting it.
    pub join_timeout: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            device_path: None,
            simulation_mode: false,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            reopen_attempts: DEFAULT_REOPEN_ATTEMPTS,
            reopen_delay: Duration::from_millis(DEFAULT_REOPEN_DELAY_MS),
            join_timeout: Duration::from_millis(DEFAULT_JOIN_TIMEOUT_MS),
        }
    }
}

impl From<&RfidSettings> for DecoderConfig {
    fn from(settings: &RfidSettings) -> Self {
        Self {
            device_path: settings.device_path.clone(),
            simulation_mode: settings.simulation_mode,
            ..Self::default()
        }
    }
}

/// Why the decoder is simulating instead of reading hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationReason {
    /// Simulation was configured.
    Requested,
    /// No input subsystem on this platform.
    Unsupported,
    /// The locator found no reader.
    NoDeviceFound,
    /// The reader could not be opened.
    OpenFailed,
    /// The reader failed and could not be reopened.
    DeviceLost,
}

impl fmt::Display for SimulationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Requested => "requested",
            Self::Unsupported => "input devices unsupported",
            Self::NoDeviceFound => "no card reader found",
            Self::OpenFailed => "card reader could not be opened",
            Self::DeviceLost => "card reader lost",
        };
        f.write_str(text)
    }
}

/// Current operating mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DecoderMode {
    Stopped,
    Hardware { path: PathBuf, name: String },
    Simulation { reason: SimulationReason },
}

impl DecoderMode {
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Hardware { .. })
    }

    pub fn is_simulation(&self) -> bool {
        matches!(self, Self::Simulation { .. })
    }
}

/// Mode picked at start, carrying the opened source for hardware.
enum InitialMode {
    Hardware { source: AnyKeySource, path: PathBuf },
    Simulation,
}

enum LoopExit {
    Cancelled,
    DeviceLost,
}

enum Reopen {
    Opened { source: AnyKeySource, path: PathBuf },
    Cancelled,
    Exhausted,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct DecoderInner {
    config: DecoderConfig,
    backend: AnyInputBackend,
    locator: DeviceLocator,
    callbacks: CallbackRegistry<CardIdentifier>,
    mode: Mutex<DecoderMode>,
    worker: Mutex<Option<Worker>>,
}

/// Card reader front end.
///
/// Cloning yields another handle to the same decoder.
#[derive(Clone)]
pub struct CardDecoder {
    inner: Arc<DecoderInner>,
}

impl fmt::Debug for CardDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDecoder")
            .field("mode", &*self.inner.mode.lock())
            .field("callbacks", &self.inner.callbacks.len())
            .finish_non_exhaustive()
    }
}

impl CardDecoder {
    /// Decoder over the platform's input backend.
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_backend(config, AnyInputBackend::platform_default())
    }

    /// Decoder over an explicit backend.
    pub fn with_backend(config: DecoderConfig, backend: AnyInputBackend) -> Self {
        Self::with_locator(config, backend, DeviceLocator::default())
    }

    /// Decoder over an explicit backend and locator.
    pub fn with_locator(
        config: DecoderConfig,
        backend: AnyInputBackend,
        locator: DeviceLocator,
    ) -> Self {
        Self {
            inner: Arc::new(DecoderInner {
                config,
                backend,
                locator,
                callbacks: CallbackRegistry::new("card decoder"),
                mode: Mutex::new(DecoderMode::Stopped),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.inner.config
    }

    /// Current operating mode.
    pub fn mode(&self) -> DecoderMode {
        self.inner.mode.lock().clone()
    }

    /// Whether the background loop is alive.
    pub fn is_running(&self) -> bool {
        self.inner
            .worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Add a subscriber; it is notified after every earlier registration.
    pub fn register_callback<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&CardIdentifier) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.callbacks.register(callback)
    }

    /// Remove exactly the registration behind `subscription`.
    ///
    /// Returns `false` if it was already gone.
    pub fn unregister_callback(&self, subscription: Subscription) -> bool {
        subscription.unregister()
    }

    /// Number of registered callbacks.
    pub fn callback_count(&self) -> usize {
        self.inner.callbacks.len()
    }

    /// Choose the operating mode and spawn the processing loop.
    ///
    /// Does nothing if the loop is already running. Must be called from
    /// within a Tokio runtime; outside one the call is logged and ignored.
    pub fn start(&self) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!(error = %e, "Card decoder needs a Tokio runtime, not starting");
                return;
            }
        };

        let mut worker = self.inner.worker.lock();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            debug!("Card decoder already running");
            return;
        }

        let initial = self.inner.select_mode();
        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let token = cancel.clone();
        let handle = runtime.spawn(async move { inner.run(initial, token).await });

        *worker = Some(Worker { cancel, handle });
    }

    /// Ask the loop to exit and wait up to `join_timeout` for it.
    ///
    /// A loop that does not exit in time is aborted. Safe to call repeatedly.
    pub async fn stop(&self) {
        let worker = self.inner.worker.lock().take();

        if let Some(Worker { cancel, handle }) = worker {
            cancel.cancel();
            let abort = handle.abort_handle();

            match tokio::time::timeout(self.inner.config.join_timeout, handle).await {
                Ok(Ok(())) => debug!("Card decoder loop exited"),
                Ok(Err(e)) => warn!(error = %e, "Card decoder loop terminated abnormally"),
                Err(_) => {
                    warn!(
                        timeout_ms = self.inner.config.join_timeout.as_millis() as u64,
                        "Card decoder loop did not exit in time, aborting"
                    );
                    abort.abort();
                }
            }
        }

        self.inner.transition(DecoderMode::Stopped);
    }

    /// Notify every callback with `identifier`, or with a random 8-digit hex
    /// identifier when `None`, and return it.
    ///
    /// Works in every mode and bypasses debouncing.
    pub fn simulate_card_read(&self, identifier: Option<CardIdentifier>) -> CardIdentifier {
        let card = identifier.unwrap_or_else(|| CardIdentifier::random(SIMULATED_UID_LENGTH));
        info!(card = %card, "Simulated card read");
        self.inner.callbacks.notify(&card);
        card
    }
}

impl DecoderInner {
    fn transition(&self, next: DecoderMode) {
        let mut mode = self.mode.lock();
        if *mode == next {
            return;
        }

        match &next {
            DecoderMode::Stopped => info!("Card decoder stopped"),
            DecoderMode::Hardware { path, name } => info!(
                path = %path.display(),
                device = %name,
                "Card decoder reading hardware"
            ),
            DecoderMode::Simulation {
                reason: SimulationReason::Requested,
            } => info!("Card decoder running in simulation mode"),
            DecoderMode::Simulation { reason } => {
                warn!(%reason, "Card decoder falling back to simulation mode")
            }
        }
        *mode = next;
    }

    fn simulate(&self, reason: SimulationReason) -> InitialMode {
        self.transition(DecoderMode::Simulation { reason });
        InitialMode::Simulation
    }

    fn resolve_path(&self) -> Result<PathBuf> {
        match &self.config.device_path {
            Some(path) => Ok(path.clone()),
            None => self.locator.locate(&self.backend).map(|device| device.path),
        }
    }

    fn select_mode(&self) -> InitialMode {
        if self.config.simulation_mode {
            return self.simulate(SimulationReason::Requested);
        }

        if !self.backend.is_supported() {
            debug!(backend = self.backend.backend_name(), "Input backend unavailable");
            return self.simulate(SimulationReason::Unsupported);
        }

        let path = match self.resolve_path() {
            Ok(path) => path,
            Err(e) => {
                debug!(error = %e, "Card reader detection failed");
                return self.simulate(SimulationReason::NoDeviceFound);
            }
        };

        match self.backend.open(&path) {
            Ok(source) => {
                self.transition(DecoderMode::Hardware {
                    path: path.clone(),
                    name: source.name().to_string(),
                });
                InitialMode::Hardware { source, path }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open card reader");
                self.simulate(SimulationReason::OpenFailed)
            }
        }
    }

    async fn run(self: Arc<Self>, initial: InitialMode, cancel: CancellationToken) {
        if let InitialMode::Hardware { source, path } = initial {
            match self.read_loop(source, path, &cancel).await {
                LoopExit::Cancelled => return,
                LoopExit::DeviceLost => self.transition(DecoderMode::Simulation {
                    reason: SimulationReason::DeviceLost,
                }),
            }
        }

        // Simulation idles; identifiers arrive through simulate_card_read.
        cancel.cancelled().await;
    }

    async fn read_loop(
        &self,
        mut source: AnyKeySource,
        mut path: PathBuf,
        cancel: &CancellationToken,
    ) -> LoopExit {
        let mut session = DecoderSession::new(self.config.debounce);

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return LoopExit::Cancelled,
                event = source.next_event() => event,
            };

            match event {
                Ok(event) => {
                    if let Some(card) = session.feed(&event) {
                        info!(card = %card, device = source.name(), "Card read");
                        self.callbacks.notify(&card);
                    }
                }
                Err(e) => {
                    if e.is_disconnect() {
                        warn!(path = %path.display(), error = %e, "Card reader disconnected");
                    } else {
                        warn!(path = %path.display(), error = %e, "Card reader read error");
                    }
                    session.reset();

                    match self.reopen(cancel).await {
                        Reopen::Opened {
                            source: reopened,
                            path: reopened_path,
                        } => {
                            source = reopened;
                            path = reopened_path;
                        }
                        Reopen::Cancelled => return LoopExit::Cancelled,
                        Reopen::Exhausted => return LoopExit::DeviceLost,
                    }
                }
            }
        }
    }

    async fn reopen(&self, cancel: &CancellationToken) -> Reopen {
        let attempts = self.config.reopen_attempts;

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Reopen::Cancelled;
            }

            let opened = self
                .resolve_path()
                .and_then(|path| self.backend.open(&path).map(|source| (source, path)));

            match opened {
                Ok((source, path)) => {
                    info!(attempt, path = %path.display(), "Card reader reopened");
                    self.transition(DecoderMode::Hardware {
                        path: path.clone(),
                        name: source.name().to_string(),
                    });
                    return Reopen::Opened { source, path };
                }
                Err(e) => warn!(attempt, attempts, error = %e, "Reopening card reader failed"),
            }

            if attempt < attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Reopen::Cancelled,
                    _ = tokio::time::sleep(self.config.reopen_delay) => {}
                }
            }
        }

        Reopen::Exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockInputBackend, MockInputHandle};
    use crate::types::{DeviceCapabilities, InputDeviceInfo};

    fn reader(path: &str) -> InputDeviceInfo {
        InputDeviceInfo::new(path, "USB RFID Reader", DeviceCapabilities::keyboard(40))
    }

    fn mock_decoder(config: DecoderConfig) -> (CardDecoder, MockInputHandle) {
        let (backend, handle) = MockInputBackend::new();
        (
            CardDecoder::with_backend(config, AnyInputBackend::Mock(backend)),
            handle,
        )
    }

    #[test]
    fn test_config_from_settings() {
        let settings = RfidSettings {
            device_path: Some(PathBuf::from("/dev/input/event2")),
            simulation_mode: true,
        };
        let config = DecoderConfig::from(&settings);
        assert_eq!(config.device_path, settings.device_path);
        assert!(config.simulation_mode);
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert_eq!(config.reopen_attempts, 3);
    }

    #[test]
    fn test_start_outside_runtime_is_ignored() {
        let (decoder, _handle) = mock_decoder(DecoderConfig::default());
        decoder.start();
        assert!(!decoder.is_running());
        assert_eq!(decoder.mode(), DecoderMode::Stopped);
    }

    #[test]
    fn test_simulate_without_start() {
        let (decoder, _handle) = mock_decoder(DecoderConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        decoder
            .register_callback(move |card| {
                sink.lock().push(card.clone());
                Ok(())
            })
            .detach();

        let explicit = CardIdentifier::new("12345678").unwrap();
        assert_eq!(decoder.simulate_card_read(Some(explicit.clone())), explicit);

        let generated = decoder.simulate_card_read(None);
        assert_eq!(generated.len(), 8);
        assert!(generated.is_hex());

        assert_eq!(*seen.lock(), vec![explicit, generated]);
    }

    #[tokio::test]
    async fn test_requested_simulation_never_touches_backend() {
        let (decoder, handle) = mock_decoder(DecoderConfig {
            simulation_mode: true,
            ..DecoderConfig::default()
        });
        handle.add_device(reader("/dev/input/event3"));

        decoder.start();
        assert_eq!(
            decoder.mode(),
            DecoderMode::Simulation {
                reason: SimulationReason::Requested
            }
        );
        assert_eq!(handle.open_count(), 0);

        decoder.stop().await;
        assert!(!decoder.is_running());
    }

    #[tokio::test]
    async fn test_unsupported_backend_simulates() {
        let (decoder, handle) = mock_decoder(DecoderConfig::default());
        handle.set_supported(false);

        decoder.start();
        assert_eq!(
            decoder.mode(),
            DecoderMode::Simulation {
                reason: SimulationReason::Unsupported
            }
        );
        decoder.stop().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (decoder, _handle) = mock_decoder(DecoderConfig::default());
        decoder.stop().await;
        decoder.start();
        assert!(decoder.is_running());
        decoder.stop().await;
        decoder.stop().await;
        assert_eq!(decoder.mode(), DecoderMode::Stopped);
    }

    #[test]
    fn test_mode_serialization() {
        let mode = DecoderMode::Simulation {
            reason: SimulationReason::NoDeviceFound,
        };
        let json = serde_json::to_value(&mode).unwrap();
        assert_eq!(json["mode"], "simulation");
        assert_eq!(json["reason"], "no_device_found");
    }
}
