//! Shared building blocks for the ConsultEase card-reader bridge.
//!
//! - [`CardIdentifier`]: validated token produced by one card scan
//! - [`registry::CallbackRegistry`]: ordered subscriber list with handles
//! - [`config::Settings`]: environment-driven settings
//! - [`constants`]: defaults and recommended timing values

pub mod config;
pub mod constants;
pub mod error;
pub mod registry;
pub mod types;

pub use error::{Error, Result};
pub use registry::{CallbackRegistry, NotifyReport, Subscription, SubscriptionId};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
