//! Validated primitive types shared across the care manager crates.
//!
//! Values of these types can only be constructed through their checked constructors, so any
//! function that accepts them can skip re-validating identifiers and free text.

use std::fmt;

/// Errors raised when constructing a validated primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    /// The input text was empty or contained only whitespace.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The identifier was zero or negative.
    #[error("invalid {field} {value}")]
    NonPositive { field: &'static str, value: i64 },
}

/// A database or remote-record identifier that is guaranteed to be positive.
///
/// Identifiers in the care manager schema and in the booking peer are 64-bit integers starting
/// at 1. Zero means "unset" on the wire, so it is rejected alongside negatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(i64);

impl RecordId {
    /// Validates `value` as an identifier; `field` names it in the error.
    pub fn new(field: &'static str, value: i64) -> Result<Self, TypesError> {
        if value <= 0 {
            return Err(TypesError::NonPositive { field, value });
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RecordId> for i64 {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

/// Trimmed text with at least one non-whitespace character.
///
/// Used for keys that must never be blank, such as the external medical record number that
/// deduplicates patients across repeat encounters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    pub fn new(field: &'static str, input: impl AsRef<str>) -> Result<Self, TypesError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypesError::Empty { field });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
