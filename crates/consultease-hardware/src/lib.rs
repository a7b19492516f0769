//! Card reader input layer for the ConsultEase bridge.
//!
//! USB RFID readers in keyboard-emulation mode "type" each card UID followed
//! by Enter. This crate finds such a reader among the host's input devices,
//! decodes its keystrokes into [`CardIdentifier`]s, and notifies subscribers.
//! When no reader is usable it keeps running in simulation mode so the rest
//! of the application is unaffected.
//!
//! # Layers
//!
//! - [`keymap`] and [`session`]: the pure decoding state machine.
//! - [`traits`] and [`devices`]: the backend seam, with enum dispatch over
//!   the evdev backend (Linux) and the [`mock`] backend.
//! - [`locator`]: reader discovery heuristics.
//! - [`decoder`]: the [`CardDecoder`] lifecycle and mode selection.
//!
//! # Example
//!
//! ```no_run
//! use consultease_hardware::{CardDecoder, DecoderConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let decoder = CardDecoder::new(DecoderConfig::default());
//!     decoder
//!         .register_callback(|card| {
//!             println!("card {card}");
//!             Ok(())
//!         })
//!         .detach();
//!
//!     decoder.start();
//!     tokio::signal::ctrl_c().await.ok();
//!     decoder.stop().await;
//! }
//! ```
//!
//! [`CardIdentifier`]: consultease_core::CardIdentifier

pub mod decoder;
pub mod devices;
pub mod error;
#[cfg(target_os = "linux")]
pub mod evdev_backend;
pub mod keymap;
pub mod locator;
pub mod mock;
pub mod session;
pub mod traits;
pub mod types;

pub use decoder::{CardDecoder, DecoderConfig, DecoderMode, SimulationReason};
pub use devices::{AnyInputBackend, AnyKeySource};
pub use error::{HardwareError, Result};
pub use locator::DeviceLocator;
pub use session::DecoderSession;
pub use types::{DeviceCapabilities, InputDeviceInfo, KeyCode, KeyState, RawKeyEvent};
