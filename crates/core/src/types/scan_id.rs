//! Scan identifier type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ScanId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanIdError {
    /// The input is empty or contains only whitespace.
    #[error("scan identifier cannot be empty")]
    Empty,
}

/// The raw value read from a badge scan.
///
/// Badge readers act as keyboards and often append a newline or pad the value
/// with spaces, so surrounding whitespace is trimmed. Beyond that the value is
/// opaque: directory backends decide what a valid identifier looks like.
///
/// ## Examples
///
/// ```
/// use checkin_core::ScanId;
///
/// assert_eq!(ScanId::parse(" 1234567890\n").unwrap().as_str(), "1234567890");
/// assert!(ScanId::parse("").is_err());
/// assert!(ScanId::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ScanId(String);

impl ScanId {
    /// Parse a `ScanId` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`ScanIdError::Empty`] if the input is empty after trimming.
    pub fn parse(s: &str) -> Result<Self, ScanIdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ScanIdError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ScanId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ScanId {
    type Err = ScanIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ScanId {
    type Error = ScanIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ScanId> for String {
    fn from(id: ScanId) -> Self {
        id.0
    }
}

impl AsRef<str> for ScanId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
