//! Error types for data parsing in swingsense-types.

use thiserror::Error;

/// Errors that can occur when parsing SwingSense frame payloads.
///
/// The notification decoder itself never fails (unexpected lengths become
/// [`crate::Frame::Malformed`]); this error is only returned by the direct
/// constructors such as [`crate::SampleRecord::from_bytes`].
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload does not have the exact length the format requires.
    #[error("Invalid frame length: requires {expected} bytes, got {actual}")]
    InsufficientBytes {
        /// Number of bytes the format requires.
        expected: usize,
        /// Number of bytes supplied.
        actual: usize,
    },
}

/// Result type alias using swingsense-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_bytes_display() {
        let err = ParseError::InsufficientBytes {
            expected: 24,
            actual: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("requires 24 bytes"));
        assert!(msg.contains("got 7"));
    }
}
