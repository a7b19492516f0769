//! MQTT topic patterns.
//!
//! Topics are `/`-separated levels. In subscription patterns `+` matches
//! exactly one level (possibly empty) and a trailing `#` matches all remaining
//! levels, including none. As in MQTT 3.1.1 §4.7.2, a pattern starting with
//! a wildcard does not match topics beginning with `$`.
//!
//! # Examples
//!
//! ```
//! use consultease_network::topic::TopicFilter;
//!
//! let filter = TopicFilter::parse("consultease/faculty/+/status").unwrap();
//! assert!(filter.matches("consultease/faculty/12/status"));
//! assert!(!filter.matches("consultease/faculty/12/13/status"));
//! assert!(!filter.matches("consultease/faculty/status"));
//! ```

use crate::error::{MessagingError, Result};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Level {
    Exact(String),
    /// `+`
    Single,
    /// `#`
    Multi,
}

/// Validated subscription pattern.
#[derive(Debug, Clone)]
pub struct TopicFilter {
    pattern: String,
    levels: Vec<Level>,
}

impl TopicFilter {
    /// Parse and validate a subscription pattern.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::InvalidTopic` if the pattern is empty, a
    /// wildcard shares a level with other characters, `#` is not last, or it
    /// contains a NUL character.
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(MessagingError::invalid_topic(pattern, "pattern is empty"));
        }
        if pattern.contains('\0') {
            return Err(MessagingError::invalid_topic(pattern, "contains NUL"));
        }

        let segments: Vec<&str> = pattern.split('/').collect();
        let last = segments.len() - 1;
        let mut levels = Vec::with_capacity(segments.len());

        for (i, segment) in segments.into_iter().enumerate() {
            let level = match segment {
                "+" => Level::Single,
                "#" if i == last => Level::Multi,
                "#" => {
                    return Err(MessagingError::invalid_topic(
                        pattern,
                        "'#' must be the last level",
                    ));
                }
                s if s.contains(['+', '#']) => {
                    return Err(MessagingError::invalid_topic(
                        pattern,
                        "wildcards must occupy a whole level",
                    ));
                }
                s => Level::Exact(s.to_string()),
            };
            levels.push(level);
        }

        Ok(Self {
            pattern: pattern.to_string(),
            levels,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Whether the pattern contains `+` or `#`.
    pub fn is_wildcard(&self) -> bool {
        self.levels.iter().any(|l| !matches!(l, Level::Exact(_)))
    }

    /// Whether `topic` is matched by this pattern.
    pub fn matches(&self, topic: &str) -> bool {
        if topic.starts_with('$') && !matches!(self.levels.first(), Some(Level::Exact(_))) {
            return false;
        }

        let mut parts = topic.split('/');
        for level in &self.levels {
            match level {
                Level::Multi => return true,
                Level::Single => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Level::Exact(expected) => {
                    if parts.next() != Some(expected.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }
}

impl PartialEq for TopicFilter {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for TopicFilter {}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl FromStr for TopicFilter {
    type Err = MessagingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Check that `topic` is usable as a publish topic (no wildcards).
///
/// # Errors
///
/// Returns `MessagingError::InvalidTopic` for empty topics or topics
/// containing `+`, `#` or NUL.
pub fn validate_publish_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(MessagingError::invalid_topic(topic, "topic is empty"));
    }
    if topic.contains(['+', '#']) {
        return Err(MessagingError::invalid_topic(
            topic,
            "wildcards are not allowed when publishing",
        ));
    }
    if topic.contains('\0') {
        return Err(MessagingError::invalid_topic(topic, "contains NUL"));
    }
    Ok(())
}
