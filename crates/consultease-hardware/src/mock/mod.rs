//! Mock input backend for testing and development.
//!
//! Simulates a host with a configurable set of input devices whose key
//! events are injected programmatically, without touching `/dev/input`.

pub mod input;

pub use input::{MockInputBackend, MockInputHandle, MockKeySource};
