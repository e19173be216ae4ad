//! Protocol-version handshake packet.
//!
//! The first binary message a server sends after the socket opens, before
//! any frame:
//!
//! ```text
//! fixarray(2) [ [major, minor, patch], [extension, ...] ]
//! ```
//!
//! It deliberately does not share the frame shape, so a peer that skips the
//! handshake can never have its first frame mistaken for a version packet.

use std::fmt;

use rmp::encode::{write_array_len, write_str, write_u8};
use rmpv::Value;

use crate::error::{DecodeError, EncodeError};

/// Protocol version implemented by this crate.
pub const VERSION: &str = "0.0.1";

/// Major component of [`VERSION`].
pub const VERSION_MAJOR: u8 = 0;
/// Minor component of [`VERSION`].
pub const VERSION_MINOR: u8 = 0;
/// Patch component of [`VERSION`].
pub const VERSION_PATCH: u8 = 1;

/// Protocol extensions implemented by this crate. None yet.
pub const EXTENSIONS: [&str; 0] = [];

/// Encode the handshake packet advertising this crate's protocol version
/// and extensions.
#[allow(clippy::cast_possible_truncation)]
pub fn protocol_version_packet() -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();

    let _ = write_array_len(&mut buf, 2)?;

    let _ = write_array_len(&mut buf, 3)?;
    write_u8(&mut buf, VERSION_MAJOR)?;
    write_u8(&mut buf, VERSION_MINOR)?;
    write_u8(&mut buf, VERSION_PATCH)?;

    let _ = write_array_len(&mut buf, EXTENSIONS.len() as u32)?;
    for extension in EXTENSIONS {
        write_str(&mut buf, extension)?;
    }

    Ok(buf)
}

/// Protocol version and extensions advertised by the remote peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerVersion {
    /// Major version component.
    pub major: u8,
    /// Minor version component.
    pub minor: u8,
    /// Patch version component.
    pub patch: u8,
    /// Extension tokens the peer supports.
    pub extensions: Vec<String>,
}

impl ServerVersion {
    /// Decode a handshake packet.
    ///
    /// Returns [`DecodeError::InvalidStructure`] for anything that is not a
    /// version packet — including a regular frame, whose packed field is an
    /// integer where the version triple's array belongs.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut rd = bytes;
        let value = rmpv::decode::read_value(&mut rd)?;
        if !rd.is_empty() {
            return Err(DecodeError::TrailingBytes { count: rd.len() });
        }

        let Value::Array(items) = value else {
            return Err(DecodeError::InvalidStructure);
        };
        let [Value::Array(triple), Value::Array(extensions)] = items.as_slice() else {
            return Err(DecodeError::InvalidStructure);
        };
        let [major, minor, patch] = triple.as_slice() else {
            return Err(DecodeError::InvalidStructure);
        };
        let (Some(major), Some(minor), Some(patch)) = (as_u8(major), as_u8(minor), as_u8(patch))
        else {
            return Err(DecodeError::InvalidStructure);
        };

        let extensions = extensions
            .iter()
            .map(|ext| ext.as_str().map(ToOwned::to_owned))
            .collect::<Option<Vec<_>>>()
            .ok_or(DecodeError::InvalidStructure)?;

        Ok(Self {
            major,
            minor,
            patch,
            extensions,
        })
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn as_u8(value: &Value) -> Option<u8> {
    value.as_u64().and_then(|n| u8::try_from(n).ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
