//! Debounced accumulation of key events into card identifiers.
//!
//! A [`DecoderSession`] is the pure state machine behind the card decoder:
//! feed it key events in arrival order and it yields a [`CardIdentifier`]
//! whenever a terminator completes a non-empty read.
//!
//! Rules:
//! - every key event, in any state, refreshes the last-event time;
//! - a gap larger than the debounce window while characters are pending
//!   discards them before the new event is applied;
//! - only key-down events append characters or terminate a read;
//! - a terminator with nothing pending emits nothing.
//!
//! # Examples
//!
//! ```
//! use consultease_hardware::session::DecoderSession;
//! use consultease_hardware::types::{KeyCode, RawKeyEvent};
//! use std::time::Duration;
//!
//! let mut session = DecoderSession::new(Duration::from_millis(500));
//! assert!(session.feed(&RawKeyEvent::pressed(KeyCode::KEY_1)).is_none());
//! assert!(session.feed(&RawKeyEvent::pressed(KeyCode::KEY_A)).is_none());
//!
//! let card = session.feed(&RawKeyEvent::pressed(KeyCode::KEY_ENTER)).unwrap();
//! assert_eq!(card.as_str(), "1A");
//! ```

use crate::keymap::{self, KeyMeaning};
use crate::types::{KeyState, RawKeyEvent};
use consultease_core::CardIdentifier;
use consultease_core::constants::MAX_CARD_IDENTIFIER_LENGTH;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Accumulates characters of one card read.
#[derive(Debug, Clone)]
pub struct DecoderSession {
    buffer: String,
    last_event: Option<Instant>,
    debounce: Duration,
}

impl DecoderSession {
    pub fn new(debounce: Duration) -> Self {
        Self {
            buffer: String::new(),
            last_event: None,
            debounce,
        }
    }

    /// Characters collected so far.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Drop any pending characters and forget the last event time.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_event = None;
    }

    /// Apply one key event; returns a card identifier when a read completes.
    pub fn feed(&mut self, event: &RawKeyEvent) -> Option<CardIdentifier> {
        if let Some(last) = self.last_event {
            let gap = event.timestamp.saturating_duration_since(last);
            if gap > self.debounce && !self.buffer.is_empty() {
                debug!(
                    discarded = %self.buffer,
                    gap_ms = gap.as_millis() as u64,
                    "Discarding stale partial read"
                );
                self.buffer.clear();
            }
        }
        self.last_event = Some(event.timestamp);

        if event.state != KeyState::Pressed {
            return None;
        }

        match keymap::decode(event.code)? {
            KeyMeaning::Char(ch) => {
                if self.buffer.len() >= MAX_CARD_IDENTIFIER_LENGTH {
                    warn!(
                        length = self.buffer.len(),
                        "Card read exceeds maximum identifier length, discarding"
                    );
                    self.buffer.clear();
                }
                self.buffer.push(ch);
                None
            }
            KeyMeaning::Terminator => {
                if self.buffer.is_empty() {
                    return None;
                }
                let raw = std::mem::take(&mut self.buffer);
                match CardIdentifier::new(raw) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable card read");
                        None
                    }
                }
            }
        }
    }
}
