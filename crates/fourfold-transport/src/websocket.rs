//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::{
    Connection, ConnectionId, Handshake, MAX_USERNAME_LEN, Transport,
    TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Settings applied to every accepted WebSocket.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Request path clients must upgrade on.
    pub path: String,
    /// Largest inbound message, in bytes. Bigger frames fail the read.
    pub max_message_size: usize,
    /// A connection with no inbound frame (pongs included) for this long
    /// is treated as closed. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// How long a new socket gets to finish the upgrade request.
    pub handshake_timeout: Duration,
    /// Names no client may connect as (compared case-insensitively).
    pub reserved_usernames: Vec<String>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
            max_message_size: 512,
            idle_timeout: None,
            handshake_timeout: Duration::from_secs(10),
            reserved_usernames: Vec::new(),
        }
    }
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: Arc<WsConfig>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address with default
    /// settings.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_config(addr, WsConfig::default()).await
    }

    /// Binds a new WebSocket transport with explicit settings.
    pub async fn bind_with_config(
        addr: &str,
        config: WsConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, path = %config.path, "WebSocket transport listening");
        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    /// The address actually bound. Useful after binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Pending = PendingUpgrade;
    type Error = TransportError;

    /// Takes the next TCP connection. The WebSocket handshake is left to
    /// [`PendingUpgrade::upgrade`].
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        Ok(PendingUpgrade {
            stream,
            addr,
            config: Arc::clone(&self.config),
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// A TCP connection that hasn't completed the WebSocket upgrade.
pub struct PendingUpgrade {
    stream: TcpStream,
    addr: SocketAddr,
    config: Arc<WsConfig>,
}

impl PendingUpgrade {
    /// The peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Handshake for PendingUpgrade {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Runs the upgrade and the username check, giving up after
    /// `handshake_timeout`.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let Self {
            stream,
            addr,
            config,
        } = self;

        // The callback runs during the upgrade and is the only place the
        // request URI is visible, so it records the outcome here.
        let mut identity: Option<Result<String, Rejection>> = None;
        let callback = |req: &Request, resp: Response| {
            let outcome = identify(req, &config.path, &config.reserved_usernames);
            let reply = match &outcome {
                Ok(_) => Ok(resp),
                Err(rejection) => Err(rejection.response()),
            };
            identity = Some(outcome);
            reply
        };

        let ws_config = WebSocketConfig::default()
            .max_message_size(Some(config.max_message_size))
            .max_frame_size(Some(config.max_message_size));

        let handshake = tokio::time::timeout(
            config.handshake_timeout,
            tokio_tungstenite::accept_hdr_async_with_config(
                stream,
                callback,
                Some(ws_config),
            ),
        )
        .await;
        let Ok(handshake) = handshake else {
            tracing::debug!(%addr, "handshake timed out");
            return Err(TransportError::HandshakeTimedOut);
        };

        let (ws, username) = match (handshake, identity) {
            (Ok(ws), Some(Ok(username))) => (ws, username),
            (_, Some(Err(rejection))) => {
                tracing::debug!(%addr, reason = %rejection.reason, "handshake rejected");
                return Err(TransportError::HandshakeRejected(rejection.reason));
            }
            (Err(e), _) => {
                return Err(TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                )));
            }
            (Ok(_), None) => {
                return Err(TransportError::HandshakeRejected(
                    "upgrade completed without a request".to_string(),
                ));
            }
        };

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, %username, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            username,
            idle_timeout: config.idle_timeout,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    username: String,
    idle_timeout: Option<Duration>,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    async fn send_message(&self, msg: Message) -> Result<(), TransportError> {
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Valid UTF-8 goes out as a text frame (browsers get a string),
    /// anything else as binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.send_message(msg).await
    }

    /// Control frames are consumed here but still count as activity for
    /// the idle timeout. Going idle reads as a clean close (`Ok(None)`).
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            let next = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::debug!(id = %self.id, "connection idle, closing");
                        return Ok(None);
                    }
                },
                None => stream.next().await,
            };
            match next {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn ping(&self) -> Result<(), Self::Error> {
        self.send_message(Message::Ping(Vec::new().into())).await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn username(&self) -> &str {
        &self.username
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Why an upgrade request was refused, and with which status.
#[derive(Debug)]
struct Rejection {
    status: StatusCode,
    reason: String,
}

impl Rejection {
    fn new(status: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    fn response(&self) -> ErrorResponse {
        let mut response = ErrorResponse::new(Some(self.reason.clone()));
        *response.status_mut() = self.status;
        response
    }
}

/// Checks the upgrade path and pulls a valid username out of the query.
fn identify(
    req: &Request,
    path: &str,
    reserved: &[String],
) -> Result<String, Rejection> {
    if req.uri().path() != path {
        return Err(Rejection::new(StatusCode::NOT_FOUND, "not found"));
    }

    let username = req
        .uri()
        .query()
        .and_then(|query| query_param(query, "username"))
        .map(|name| name.trim().to_string())
        .unwrap_or_default();

    if username.is_empty() {
        return Err(Rejection::new(
            StatusCode::BAD_REQUEST,
            "username is required",
        ));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(Rejection::new(
            StatusCode::BAD_REQUEST,
            format!("username must be at most {MAX_USERNAME_LEN} characters"),
        ));
    }
    if reserved.iter().any(|r| r.eq_ignore_ascii_case(&username)) {
        return Err(Rejection::new(
            StatusCode::BAD_REQUEST,
            "username is reserved",
        ));
    }
    Ok(username)
}

/// Returns the percent-decoded value of the first `key=value` pair.
fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        (percent_decode(k)? == key).then(|| percent_decode(v)).flatten()
    })
}

/// Decodes `%XX` escapes and `+` as space. `None` on malformed input.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = input.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).ok()
}
