//! Core domain errors.

use thiserror::Error;

/// Core domain errors for Daterr chat.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Message content exceeds the allowed length.
    #[error("Message content too long: {len} characters (max {max})")]
    ContentTooLong { len: usize, max: usize },

    /// Message content is blank.
    #[error("Message content is empty")]
    EmptyContent,
}

/// Failure to decode one inbound frame.
///
/// Only the offending frame is dropped; it never affects connection state.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Frame was not valid JSON or did not match the envelope shape.
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame was a non-text payload that could not be decoded as UTF-8.
    #[error("Frame is not valid UTF-8")]
    NotUtf8,
}
