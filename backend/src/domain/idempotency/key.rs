//! Idempotency key validation and derivation.

use std::fmt;

use serde::{Deserialize, Serialize};

use uuid::Uuid;

/// Validation errors for [`IdempotencyKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyKeyValidationError {
    /// The key string was empty.
    EmptyKey,
    /// The key carried leading or trailing whitespace.
    SurroundingWhitespace,
    /// The key contained control characters.
    ControlCharacters,
    /// The key exceeded [`IdempotencyKey::MAX_LEN`] bytes.
    TooLong {
        /// Length of the rejected key in bytes.
        len: usize,
    },
}

impl fmt::Display for IdempotencyKeyValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "idempotency key must not be empty"),
            Self::SurroundingWhitespace => {
                write!(f, "idempotency key must not start or end with whitespace")
            }
            Self::ControlCharacters => {
                write!(f, "idempotency key must not contain control characters")
            }
            Self::TooLong { len } => write!(
                f,
                "idempotency key must be at most {} bytes, got {len}",
                IdempotencyKey::MAX_LEN
            ),
        }
    }
}

impl std::error::Error for IdempotencyKeyValidationError {}

/// Deduplication token for one logical write operation.
///
/// Retries of one operation share a caller-supplied key (for example from an
/// `Idempotency-Key` header). Without one, the pipeline mints a random key, so
/// the submission never matches an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Longest accepted key, matching a `varchar(255)` column.
    pub const MAX_LEN: usize = 255;

    /// Validate and construct an [`IdempotencyKey`] from a string.
    ///
    /// # Errors
    ///
    /// Returns an [`IdempotencyKeyValidationError`] when the key is empty,
    /// padded with whitespace, contains control characters, or is longer than
    /// [`IdempotencyKey::MAX_LEN`] bytes.
    ///
    /// # Example
    ///
    /// ```
    /// # use bookshelf::domain::idempotency::IdempotencyKey;
    /// let key = IdempotencyKey::new("abc").expect("valid key");
    /// assert_eq!(key.as_ref(), "abc");
    /// ```
    pub fn new(key: impl Into<String>) -> Result<Self, IdempotencyKeyValidationError> {
        Self::from_owned(key.into())
    }

    /// Mint a key that matches no earlier submission.
    ///
    /// ```
    /// # use bookshelf::domain::idempotency::IdempotencyKey;
    /// assert_ne!(IdempotencyKey::random(), IdempotencyKey::random());
    /// ```
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    fn from_owned(key: String) -> Result<Self, IdempotencyKeyValidationError> {
        if key.is_empty() {
            return Err(IdempotencyKeyValidationError::EmptyKey);
        }
        if key.trim() != key {
            return Err(IdempotencyKeyValidationError::SurroundingWhitespace);
        }
        if key.chars().any(char::is_control) {
            return Err(IdempotencyKeyValidationError::ControlCharacters);
        }
        if key.len() > Self::MAX_LEN {
            return Err(IdempotencyKeyValidationError::TooLong { len: key.len() });
        }
        Ok(Self(key))
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<IdempotencyKey> for String {
    fn from(value: IdempotencyKey) -> Self {
        value.0
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = IdempotencyKeyValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_owned(value)
    }
}

impl TryFrom<&str> for IdempotencyKey {
    type Error = IdempotencyKeyValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_owned(value.to_owned())
    }
}
