//! Connection lifecycle management and frame transport.
//!
//! [`ServerConnection`] owns the single WebSocket to the dalang server: it
//! runs the `Disconnected → Connecting → Connected → Disconnected` state
//! machine, pumps inbound binary messages through the frame codec into the
//! listener registry, and carries outbound frames through a bounded channel
//! to a writer task. Errors at this layer are logged and absorbed — the only
//! failure signal the embedding application sees is the `disconnected`
//! lifecycle notification.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rmpv::Value;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Response as HandshakeResponse;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use dalang_protocol::{Frame, SUBPROTOCOL, ServerVersion};

use crate::config::ClientConfig;
use crate::lifecycle::LifecycleEvents;
use crate::listeners::{ListenerKey, ListenerRegistry};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection lifecycle states.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport; `connect` may be called.
    Disconnected,
    /// Transport handshake in progress.
    Connecting,
    /// Transport open; frames flow.
    Connected,
}

/// Live transport handle: the outbound channel plus the shutdown token.
/// Exactly one exists per connection; it is taken and dropped on teardown.
struct Transport {
    outbound: mpsc::Sender<Vec<u8>>,
    shutdown: CancellationToken,
}

struct Inner {
    config: ClientConfig,
    state: Mutex<ConnectionState>,
    transport: Mutex<Option<Transport>>,
    listeners: ListenerRegistry,
    lifecycle: LifecycleEvents,
    server_version: Mutex<Option<ServerVersion>>,
    dropped_frames: AtomicU64,
}

/// Handle to one dalang server connection.
///
/// Cheap to clone; every clone shares the same connection, listener
/// registry, and lifecycle subscribers. Methods never return errors:
/// usage mistakes and transport failures are logged, and the transport
/// failure additionally surfaces as a `disconnected` notification.
#[derive(Clone)]
pub struct ServerConnection {
    inner: Arc<Inner>,
}

impl ServerConnection {
    /// Create a disconnected handle.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(ConnectionState::Disconnected),
                transport: Mutex::new(None),
                listeners: ListenerRegistry::new(),
                lifecycle: LifecycleEvents::new(),
                server_version: Mutex::new(None),
                dropped_frames: AtomicU64::new(0),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Whether frames can flow right now.
    pub fn connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Protocol version the server advertised in its handshake packet, if
    /// it sent one this session.
    pub fn server_version(&self) -> Option<ServerVersion> {
        self.inner.server_version.lock().clone()
    }

    /// Total outbound frames dropped because the buffer was full, since
    /// this handle was created.
    pub fn dropped_frames(&self) -> u64 {
        self.inner.dropped_frames.load(Ordering::Relaxed)
    }

    /// Open the WebSocket to `url`, requesting the `"dalang"` sub-protocol.
    ///
    /// Ignored with a warning unless the state is `Disconnected` — one
    /// handle owns at most one transport. On success the state is
    /// `Connected` and the `connected` notification has fired by the time
    /// this returns. On failure the state is back to `Disconnected` and the
    /// `disconnected` notification has fired; no error is returned.
    pub async fn connect(&self, url: &str) {
        {
            let mut state = self.inner.state.lock();
            if *state != ConnectionState::Disconnected {
                let current = *state;
                warn!(state = ?current, "connect ignored: transport already active");
                return;
            }
            *state = ConnectionState::Connecting;
        }

        let conn_id = Uuid::now_v7();
        info!(%conn_id, url, "connecting");

        let (stream, response) = match open_transport(url).await {
            Ok(opened) => opened,
            Err(err) => {
                warn!(%conn_id, error = %err, "connect failed");
                *self.inner.state.lock() = ConnectionState::Disconnected;
                self.inner.lifecycle.notify_disconnected();
                return;
            }
        };

        // Browsers enforce the negotiated sub-protocol; natively it can
        // only be observed.
        let negotiated = response
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|v| v.to_str().ok());
        if negotiated != Some(SUBPROTOCOL) {
            warn!(%conn_id, ?negotiated, "server did not confirm the dalang sub-protocol");
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(self.inner.config.outbound_buffer);
        let shutdown = CancellationToken::new();
        *self.inner.server_version.lock() = None;
        *self.inner.transport.lock() = Some(Transport {
            outbound: outbound_tx,
            shutdown: shutdown.clone(),
        });
        *self.inner.state.lock() = ConnectionState::Connected;
        info!(%conn_id, "connected");
        self.inner.lifecycle.notify_connected();

        let (ws_tx, ws_rx) = stream.split();
        let _ = tokio::spawn(write_loop(ws_tx, outbound_rx, shutdown, conn_id));
        let inner = Arc::clone(&self.inner);
        let _ = tokio::spawn(async move {
            read_loop(ws_rx, &inner, conn_id).await;
            teardown(&inner, conn_id);
        });
    }

    /// Encode `(opcode, category, payload)` and write it to the transport.
    ///
    /// Fire-and-forget: ignored with a warning while not connected, and a
    /// full outbound buffer drops the frame (counted by
    /// [`dropped_frames`](Self::dropped_frames)). No delivery
    /// acknowledgment, no backpressure.
    pub fn send(&self, opcode: u16, category: u16, payload: Option<Value>) {
        let Some(outbound) = self.outbound_sender() else {
            warn!(opcode, category, "send ignored: not connected");
            return;
        };

        let frame = Frame {
            opcode,
            category,
            payload,
        };
        let bytes = match dalang_protocol::encode(&frame) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(opcode, category, error = %err, "frame encode failed");
                return;
            }
        };

        if outbound.try_send(bytes).is_err() {
            let _ = self.inner.dropped_frames.fetch_add(1, Ordering::Relaxed);
            warn!(opcode, category, "outbound buffer full; frame dropped");
        }
    }

    /// Like [`send`](Self::send), converting any serializable payload into
    /// its MessagePack value first.
    pub fn send_encoded<T: Serialize>(&self, opcode: u16, category: u16, payload: &T) {
        match rmpv::ext::to_value(payload) {
            Ok(value) => self.send(opcode, category, Some(value)),
            Err(err) => {
                warn!(opcode, category, error = %err, "payload serialization failed");
            }
        }
    }

    /// Subscribe `callback` to frames on `(opcode, category)`.
    ///
    /// Ignored with a warning while not connected. Multiple listeners per
    /// key run in registration order. All listeners are dropped when the
    /// connection tears down.
    pub fn register_listener<F>(&self, opcode: u16, category: u16, callback: F)
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        self.register(opcode, category, callback, false);
    }

    /// Like [`register_listener`](Self::register_listener), but the
    /// subscription removes itself after its first dispatch.
    pub fn register_listener_once<F>(&self, opcode: u16, category: u16, callback: F)
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        self.register(opcode, category, callback, true);
    }

    /// Subscribe to the `connected` lifecycle edge. Survives reconnects.
    pub fn on_connected<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.lifecycle.on_connected(Arc::new(callback));
    }

    /// Subscribe to the `disconnected` lifecycle edge. Survives reconnects.
    pub fn on_disconnected<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.lifecycle.on_disconnected(Arc::new(callback));
    }

    /// Request transport shutdown.
    ///
    /// Ignored with a warning while not connected. The transition to
    /// `Disconnected` (and its notification) happens asynchronously once
    /// the close handshake completes, not inside this call.
    pub fn close(&self) {
        let shutdown = {
            let state = self.inner.state.lock();
            if *state != ConnectionState::Connected {
                let current = *state;
                warn!(state = ?current, "close ignored: not connected");
                return;
            }
            self.inner
                .transport
                .lock()
                .as_ref()
                .map(|t| t.shutdown.clone())
        };
        if let Some(shutdown) = shutdown {
            info!("closing connection");
            shutdown.cancel();
        }
    }

    fn register<F>(&self, opcode: u16, category: u16, callback: F, onetime: bool)
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        if !self.connected() {
            warn!(opcode, category, "listener ignored: not connected");
            return;
        }
        self.inner
            .listeners
            .register(ListenerKey { opcode, category }, Arc::new(callback), onetime);
    }

    fn outbound_sender(&self) -> Option<mpsc::Sender<Vec<u8>>> {
        if !self.connected() {
            return None;
        }
        self.inner
            .transport
            .lock()
            .as_ref()
            .map(|t| t.outbound.clone())
    }

    #[cfg(test)]
    fn listener_count(&self, opcode: u16, category: u16) -> usize {
        self.inner.listeners.count(ListenerKey { opcode, category })
    }
}

impl Default for ServerConnection {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

async fn open_transport(url: &str) -> Result<(WsStream, HandshakeResponse), WsError> {
    let mut request = url.into_client_request()?;
    let _ = request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));
    connect_async(request).await
}

/// Forward outbound frames to the socket until the channel or the socket
/// closes; on shutdown, start the close handshake instead.
async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    shutdown: CancellationToken,
    conn_id: Uuid,
) {
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(bytes) => {
                        if let Err(err) = sink.send(Message::binary(bytes)).await {
                            warn!(%conn_id, error = %err, "transport write failed");
                            break;
                        }
                    }
                    None => break,
                }
            }
            () = shutdown.cancelled() => {
                // The reader observes the close echo and runs teardown.
                if let Err(err) = sink.send(Message::Close(None)).await {
                    debug!(%conn_id, error = %err, "close frame not sent");
                }
                break;
            }
        }
    }
}

/// Pump inbound messages until close or error. The first binary message is
/// tried as the server's protocol-version handshake; everything else goes
/// through frame decode and listener dispatch.
async fn read_loop(mut stream: SplitStream<WsStream>, inner: &Inner, conn_id: Uuid) {
    let mut first_message = true;

    while let Some(next) = stream.next().await {
        match next {
            Ok(Message::Binary(bytes)) => {
                if bytes.len() > inner.config.max_message_size {
                    warn!(
                        %conn_id,
                        len = bytes.len(),
                        max = inner.config.max_message_size,
                        "dropping oversized message"
                    );
                    continue;
                }

                if std::mem::take(&mut first_message) {
                    if let Ok(version) = ServerVersion::decode(&bytes) {
                        info!(%conn_id, %version, "server protocol version");
                        *inner.server_version.lock() = Some(version);
                        continue;
                    }
                }

                match dalang_protocol::decode(&bytes) {
                    Ok(frame) => {
                        let key = ListenerKey {
                            opcode: frame.opcode,
                            category: frame.category,
                        };
                        let delivered = inner.listeners.dispatch(key, frame.payload.as_ref());
                        debug!(
                            %conn_id,
                            opcode = frame.opcode,
                            category = frame.category,
                            delivered,
                            "frame dispatched"
                        );
                    }
                    Err(err) => {
                        // One bad frame must not end the session.
                        warn!(%conn_id, error = %err, len = bytes.len(), "dropping undecodable frame");
                    }
                }
            }
            Ok(Message::Text(text)) => {
                warn!(%conn_id, len = text.len(), "ignoring text message; protocol is binary");
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Ok(Message::Close(frame)) => {
                info!(%conn_id, close = ?frame, "server closed the connection");
                break;
            }
            Err(err) => {
                warn!(%conn_id, error = %err, "transport error");
                break;
            }
        }
    }
}

/// Release the transport, clear the registry, and notify subscribers.
/// Runs exactly once per connection, after the reader stops.
fn teardown(inner: &Inner, conn_id: Uuid) {
    if let Some(transport) = inner.transport.lock().take() {
        transport.shutdown.cancel();
    }
    *inner.state.lock() = ConnectionState::Disconnected;
    inner.listeners.clear();
    info!(%conn_id, "disconnected");
    inner.lifecycle.notify_disconnected();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn starts_disconnected() {
        let conn = ServerConnection::default();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.connected());
        assert_eq!(conn.server_version(), None);
        assert_eq!(conn.dropped_frames(), 0);
    }

    #[test]
    fn clones_share_state() {
        let conn = ServerConnection::default();
        let clone = conn.clone();
        assert_eq!(clone.state(), ConnectionState::Disconnected);
        assert!(Arc::ptr_eq(&conn.inner, &clone.inner));
    }

    #[test]
    fn send_while_disconnected_is_noop() {
        let conn = ServerConnection::default();
        conn.send(0x10, 0x1, Some(Value::from("ignored")));
        // Nothing was buffered, nothing was dropped, nothing panicked.
        assert_eq!(conn.dropped_frames(), 0);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn send_encoded_while_disconnected_is_noop() {
        #[derive(Serialize)]
        struct Login<'a> {
            username: &'a str,
            password: &'a str,
        }
        let conn = ServerConnection::default();
        conn.send_encoded(
            0x10,
            0x1,
            &Login {
                username: "a",
                password: "b",
            },
        );
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn close_while_disconnected_is_noop() {
        let conn = ServerConnection::default();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn register_while_disconnected_is_noop() {
        let conn = ServerConnection::default();
        conn.register_listener(0x12, 0x1, |_| {});
        assert_eq!(conn.listener_count(0x12, 0x1), 0);
    }

    #[tokio::test]
    async fn failed_connect_returns_to_disconnected() {
        let conn = ServerConnection::default();
        let disconnects = Arc::new(AtomicUsize::new(0));
        let disconnects2 = Arc::clone(&disconnects);
        conn.on_disconnected(move || {
            let _ = disconnects2.fetch_add(1, Ordering::SeqCst);
        });

        // Nothing listens here.
        conn.connect("ws://127.0.0.1:9").await;

        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_url_returns_to_disconnected() {
        let conn = ServerConnection::default();
        conn.connect("not a url").await;
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn failed_connect_allows_another_attempt() {
        let conn = ServerConnection::default();
        conn.connect("ws://127.0.0.1:9").await;
        conn.connect("ws://127.0.0.1:9").await;
        // Both attempts ran; neither left the state stuck in Connecting.
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }
}
