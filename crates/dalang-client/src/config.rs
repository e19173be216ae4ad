//! Client configuration.

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::ServerConnection`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Outbound frame buffer capacity, in frames. Frames sent while the
    /// buffer is full are dropped with a warning.
    pub outbound_buffer: usize,
    /// Max inbound message size in bytes; larger messages are dropped
    /// without being decoded.
    pub max_message_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            max_message_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}
