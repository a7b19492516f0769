//! Input backend trait definitions.
//!
//! Two seams separate the decoder from the host input subsystem:
//!
//! - [`InputBackend`] enumerates and opens devices;
//! - [`KeyEventSource`] streams key events from one opened device.
//!
//! Both use native `async fn` in traits (Edition 2024 RPITIT) where I/O is
//! involved. Because such traits are not object-safe, concrete dispatch goes
//! through the enums in [`devices`](crate::devices).

#![allow(async_fn_in_trait)]

use crate::devices::AnyKeySource;
use crate::error::Result;
use crate::types::{InputDeviceInfo, RawKeyEvent};
use std::path::Path;

/// Stream of key events from one opened input device.
///
/// # Examples
///
/// ```no_run
/// use consultease_hardware::traits::KeyEventSource;
/// use consultease_hardware::types::KeyState;
/// use consultease_hardware::Result;
///
/// async fn count_presses<S: KeyEventSource>(source: &mut S, n: usize) -> Result<usize> {
///     let mut pressed = 0;
///     for _ in 0..n {
///         if source.next_event().await?.state == KeyState::Pressed {
///             pressed += 1;
///         }
///     }
///     Ok(pressed)
/// }
/// ```
pub trait KeyEventSource: Send {
    /// Wait for the next key event.
    ///
    /// Non-key events are skipped by the implementation.
    ///
    /// # Errors
    ///
    /// Returns an error if the device disconnects or the read fails. The
    /// source is unusable afterwards and must be reopened.
    async fn next_event(&mut self) -> Result<RawKeyEvent>;

    /// Name of the underlying device.
    fn name(&self) -> &str;
}

/// Access to the host's input devices.
pub trait InputBackend: Send + Sync {
    /// Short backend identifier for logs.
    fn backend_name(&self) -> &'static str;

    /// Whether the input subsystem exists on this host.
    fn is_supported(&self) -> bool;

    /// List every input device currently present.
    ///
    /// # Errors
    ///
    /// Returns an error if the subsystem cannot be queried.
    fn enumerate(&self) -> Result<Vec<InputDeviceInfo>>;

    /// Open a device for reading.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is missing or cannot be opened.
    fn open(&self, path: &Path) -> Result<AnyKeySource>;
}
