use crate::{Result, constants::MAX_CARD_IDENTIFIER_LENGTH, error::Error};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Decoded payload of one physical card scan.
///
/// An opaque ASCII token, usually the hexadecimal UID typed by the reader.
/// The value is kept exactly as produced: no trimming, no case folding.
///
/// # Security
/// Identifiers act as credentials, so equality is constant-time to avoid
/// leaking prefix matches through timing.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardIdentifier(String);

impl CardIdentifier {
    /// Create a new card identifier with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardIdentifier` if the value:
    /// - is empty
    /// - is longer than 64 characters
    /// - contains anything other than printable, non-space ASCII
    ///
    /// # Examples
    ///
    /// ```
    /// use consultease_core::CardIdentifier;
    ///
    /// let id = CardIdentifier::new("04ABCDEF").unwrap();
    /// assert_eq!(id.as_str(), "04ABCDEF");
    ///
    /// assert!(CardIdentifier::new("").is_err());
    /// assert!(CardIdentifier::new("04 AB").is_err());
    /// ```
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();

        if value.is_empty() {
            return Err(Error::InvalidCardIdentifier(
                "Card identifier must not be empty".to_string(),
            ));
        }

        let len = value.len();
        if len > MAX_CARD_IDENTIFIER_LENGTH {
            return Err(Error::InvalidCardIdentifier(format!(
                "Card identifier must be at most {MAX_CARD_IDENTIFIER_LENGTH} chars, got {len}"
            )));
        }

        if !value.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(Error::InvalidCardIdentifier(format!(
                "Card identifier must be printable ASCII without spaces: {value:?}"
            )));
        }

        Ok(CardIdentifier(value))
    }

    /// Generate a random uppercase hexadecimal identifier.
    ///
    /// `len` is clamped to `1..=MAX_CARD_IDENTIFIER_LENGTH`.
    ///
    /// ```
    /// use consultease_core::CardIdentifier;
    ///
    /// let id = CardIdentifier::random(8);
    /// assert_eq!(id.len(), 8);
    /// assert!(id.is_hex());
    /// ```
    #[must_use]
    pub fn random(len: usize) -> Self {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";

        let len = len.clamp(1, MAX_CARD_IDENTIFIER_LENGTH);
        let mut rng = rand::thread_rng();
        let value = (0..len)
            .map(|_| char::from(HEX[rng.gen_range(0..HEX.len())]))
            .collect();
        CardIdentifier(value)
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters in the identifier.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if every character is a hexadecimal digit.
    #[must_use]
    pub fn is_hex(&self) -> bool {
        self.0.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Consume the identifier and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CardIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CardIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardIdentifier::new(s)
    }
}

impl TryFrom<String> for CardIdentifier {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        CardIdentifier::new(value)
    }
}

impl From<CardIdentifier> for String {
    fn from(id: CardIdentifier) -> Self {
        id.0
    }
}

impl AsRef<str> for CardIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Constant-time comparison implementation for CardIdentifier
impl PartialEq for CardIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for CardIdentifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("04ABCDEF")]
    #[case("1234567890")]
    #[case("a1")]
    #[case("X")]
    fn test_card_identifier_valid(#[case] input: &str) {
        let id = CardIdentifier::new(input).unwrap();
        assert_eq!(id.as_str(), input);
        assert_eq!(id.len(), input.len());
    }

    #[rstest]
    #[case("")] // empty
    #[case(" 04AB")] // leading space
    #[case("04AB\n")] // control char
    #[case("04ÁB")] // non-ASCII
    fn test_card_identifier_invalid(#[case] input: &str) {
        assert!(CardIdentifier::new(input).is_err());
    }

    #[test]
    fn test_card_identifier_too_long() {
        let long = "A".repeat(MAX_CARD_IDENTIFIER_LENGTH + 1);
        assert!(CardIdentifier::new(long).is_err());

        let max = "A".repeat(MAX_CARD_IDENTIFIER_LENGTH);
        assert!(CardIdentifier::new(max).is_ok());
    }

    #[test]
    fn test_card_identifier_keeps_case() {
        let id: CardIdentifier = "deadBEEF".parse().unwrap();
        assert_eq!(id.to_string(), "deadBEEF");
        assert!(id.is_hex());
    }

    #[test]
    fn test_random_identifier() {
        let id = CardIdentifier::random(8);
        assert_eq!(id.len(), 8);
        assert!(id.is_hex());
        assert_eq!(id.as_str(), id.as_str().to_ascii_uppercase());

        assert_eq!(CardIdentifier::random(0).len(), 1);
        assert_eq!(
            CardIdentifier::random(1000).len(),
            MAX_CARD_IDENTIFIER_LENGTH
        );
    }

    #[test]
    fn test_card_identifier_equality() {
        let a = CardIdentifier::new("04ABCDEF").unwrap();
        let b = CardIdentifier::new("04ABCDEF").unwrap();
        let c = CardIdentifier::new("04ABCDEE").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_card_identifier_serde() {
        let id = CardIdentifier::new("04ABCDEF").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"04ABCDEF\"");

        let back: CardIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        let invalid: std::result::Result<CardIdentifier, _> = serde_json::from_str("\"\"");
        assert!(invalid.is_err());
    }
}
