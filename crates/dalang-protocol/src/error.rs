//! Error types for the wire codec.
//!
//! [`DecodeError`] covers every way an inbound message can be malformed; the
//! connection layer logs it and drops the message rather than tearing down
//! the session. [`EncodeError`] is limited to I/O failures of the underlying
//! writer and cannot occur when encoding into a `Vec<u8>` in practice.

use rmp::decode::{MarkerReadError, ValueReadError};
use thiserror::Error;

/// Errors that can occur while decoding an inbound message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The outer structure was not the expected two-element array.
    #[error("expected a two-element array")]
    InvalidStructure,

    /// A MessagePack field could not be read (wrong marker, truncated input).
    #[error("msgpack read error: {0}")]
    Msgpack(#[from] ValueReadError),

    /// The payload value could not be read.
    #[error("payload read error: {0}")]
    Payload(#[from] rmpv::decode::Error),

    /// Input continued past the end of the message.
    #[error("{count} trailing bytes after message")]
    TrailingBytes {
        /// Number of unread bytes left over.
        count: usize,
    },
}

impl From<MarkerReadError> for DecodeError {
    fn from(err: MarkerReadError) -> Self {
        Self::Msgpack(ValueReadError::InvalidMarkerRead(err.0))
    }
}

/// Errors that can occur while encoding an outbound message.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// A MessagePack field could not be written.
    #[error("msgpack write error: {0}")]
    Msgpack(#[from] rmp::encode::ValueWriteError),

    /// The payload value could not be written.
    ///
    /// `rmpv::encode::Error` is a re-export of `rmp::encode::ValueWriteError`,
    /// the same type wrapped by [`EncodeError::Msgpack`], so this variant
    /// cannot carry its own `#[from]` conversion (the blanket impl would
    /// conflict). Payload write failures surface as `Msgpack` instead.
    #[error("payload write error: {0}")]
    Payload(rmpv::encode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_structure_display() {
        let err = DecodeError::InvalidStructure;
        assert_eq!(err.to_string(), "expected a two-element array");
    }

    #[test]
    fn trailing_bytes_display() {
        let err = DecodeError::TrailingBytes { count: 3 };
        assert_eq!(err.to_string(), "3 trailing bytes after message");
    }

    #[test]
    fn msgpack_error_display() {
        let read_err = ValueReadError::TypeMismatch(rmp::Marker::Null);
        let err = DecodeError::from(read_err);
        assert!(err.to_string().contains("msgpack read error"));
    }

    #[test]
    fn marker_error_converts_to_msgpack_variant() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: DecodeError = MarkerReadError(io_err).into();
        assert!(matches!(err, DecodeError::Msgpack(_)));
    }
}
