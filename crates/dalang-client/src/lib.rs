//! # dalang-client
//!
//! Connection core for dalang clients: one persistent WebSocket to the
//! server, the MessagePack frame codec underneath, and a keyed listener
//! registry on top so independent callers can subscribe to (opcode,
//! category) message classes without stepping on each other.
//!
//! The embedding application drives everything through a cloneable
//! [`ServerConnection`] handle:
//!
//! ```rust
//! use dalang_client::ServerConnection;
//! use dalang_protocol::opcodes;
//!
//! # async fn example() {
//! let conn = ServerConnection::default();
//! conn.on_connected(|| println!("up"));
//! conn.on_disconnected(|| println!("down"));
//!
//! conn.connect("wss://example.org/dalang").await;
//!
//! conn.register_listener(
//!     opcodes::S_OPCODE_AUTH_LOGIN_SUCCESS,
//!     opcodes::CATEGORY_AUTH,
//!     |payload| println!("logged in: {payload:?}"),
//! );
//! # }
//! ```
//!
//! This layer does not retry, reconnect, or correlate requests with
//! responses; that belongs to the application above it.

#![deny(unsafe_code)]

mod config;
mod connection;
mod lifecycle;
mod listeners;

pub use config::ClientConfig;
pub use connection::{ConnectionState, ServerConnection};

pub use dalang_protocol::{Frame, SUBPROTOCOL, ServerVersion};
