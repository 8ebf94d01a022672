//! Error types for data parsing in nearby-types.

use thiserror::Error;

/// Errors that can occur when parsing identity data.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in nearby-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Identity payload bytes were not valid UTF-8.
    #[error("Identity payload is not valid UTF-8")]
    InvalidUtf8,

    /// Identity payload did not contain exactly two comma-separated fields.
    #[error("Identity payload has {0} field(s), expected 2")]
    FieldCount(usize),

    /// The user id field was not an integer.
    #[error("Invalid user id: '{0}'")]
    InvalidUserId(String),

    /// An identity key was not a valid UUID string.
    #[error("Invalid identity key: '{0}'")]
    InvalidIdentityKey(String),
}

/// Result type alias using nearby-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
