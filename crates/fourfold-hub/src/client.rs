//! Live connection handles.

use fourfold_protocol::ServerMessage;
use fourfold_transport::ConnectionId;
use tokio::sync::broadcast;

/// The hub's view of one live connection: who it is and where to queue
/// messages for it.
///
/// The outbound queue is a bounded `broadcast` channel with a single
/// receiver (the connection's writer task). A full queue never blocks
/// the sender: the oldest pending message is overwritten and the writer
/// sees a `Lagged` error, which it logs.
///
/// Cloning is cheap and every clone feeds the same queue.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    username: String,
    conn_id: ConnectionId,
    tx: broadcast::Sender<ServerMessage>,
}

impl ClientHandle {
    /// Creates a handle plus the receiver its writer task drains.
    pub fn new(
        username: impl Into<String>,
        conn_id: ConnectionId,
        capacity: usize,
    ) -> (Self, broadcast::Receiver<ServerMessage>) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        let handle = Self {
            username: username.into(),
            conn_id,
            tx,
        };
        (handle, rx)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Queues a message. Returns `false` if the writer has gone away.
    pub fn send(&self, msg: ServerMessage) -> bool {
        if self.tx.send(msg).is_err() {
            tracing::debug!(
                username = %self.username,
                conn_id = %self.conn_id,
                "dropping message for closed connection"
            );
            return false;
        }
        true
    }

    /// `true` while the writer task is still draining the queue.
    pub fn is_live(&self) -> bool {
        self.tx.receiver_count() > 0
    }
}
