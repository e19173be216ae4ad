//! MessagePack frame codec.
//!
//! Canonical wire shape (positional):
//!
//! ```text
//! ┌─────────────┬──────────────────────────────┬──────────────────┐
//! │ fixarray(2) │ u32 (category << 16 | opcode)│ payload (or nil) │
//! └─────────────┴──────────────────────────────┴──────────────────┘
//! ```
//!
//! The packed field always uses the fixed-width u32 representation; the
//! server reads it with a plain `read_u32`, so smaller encodings would be
//! rejected by the peer. The labeled (named-field) shape seen in one source
//! variant is not part of this contract and is never auto-detected.

use rmp::Marker;
use rmp::decode::{read_marker, read_u32};
use rmp::encode::{write_array_len, write_u32};
use rmpv::Value;

use crate::error::{DecodeError, EncodeError};
use crate::frame::Frame;

/// Encode a frame into its canonical wire bytes.
pub fn encode(frame: &Frame) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::with_capacity(8);
    let _ = write_array_len(&mut buf, 2)?;
    write_u32(&mut buf, frame.packed())?;
    match &frame.payload {
        Some(value) => rmpv::encode::write_value(&mut buf, value)?,
        None => rmpv::encode::write_value(&mut buf, &Value::Nil)?,
    }
    Ok(buf)
}

/// Decode wire bytes back into a frame.
///
/// Rejects anything that is not exactly one canonical frame: a different
/// outer structure, a packed field that is not a fixed-width u32, an
/// unreadable payload, or bytes trailing the payload.
pub fn decode(mut bytes: &[u8]) -> Result<Frame, DecodeError> {
    match read_marker(&mut bytes)? {
        Marker::FixArray(2) => {}
        _ => return Err(DecodeError::InvalidStructure),
    }

    let packed = read_u32(&mut bytes)?;
    let (opcode, category) = Frame::unpack(packed);

    let value = rmpv::decode::read_value(&mut bytes)?;
    if !bytes.is_empty() {
        return Err(DecodeError::TrailingBytes { count: bytes.len() });
    }

    let payload = match value {
        Value::Nil => None,
        other => Some(other),
    };

    Ok(Frame {
        opcode,
        category,
        payload,
    })
}
