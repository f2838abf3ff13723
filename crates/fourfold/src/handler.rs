//! Per-connection handler: register, read, write, clean up.
//!
//! Each accepted connection gets its own task running
//! [`handle_connection`], plus one writer task:
//!
//! ```text
//!   reader (this task)                writer task
//!   ──────────────────                ───────────
//!   recv frame                        outbound.recv() ─► encode ─► send
//!     └─► router.handle_frame         every ping_interval ─► ping
//!   ...                               stop signal ─► drain, exit
//!   closed / idle / error
//!     └─► router.disconnect ─► stop writer ─► close socket
//! ```
//!
//! The hub only ever talks to the connection through its
//! [`ClientHandle`], never the socket.

use std::sync::Arc;
use std::time::Duration;

use fourfold_hub::ClientHandle;
use fourfold_protocol::{Codec, Envelope, JsonCodec, ServerMessage};
use fourfold_transport::{Connection, WebSocketConnection};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use crate::events::EventSink;
use crate::router::Router;
use crate::store::PlayerStore;
use crate::FourfoldError;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, E>(
    conn: WebSocketConnection,
    router: Router<S, E>,
    ping_interval: Duration,
) -> Result<(), FourfoldError>
where
    S: PlayerStore,
    E: EventSink,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::info!(%conn_id, username = %conn.username(), "client connected");

    let capacity = router.hub().config().outbound_capacity;
    let (client, outbound) =
        ClientHandle::new(conn.username(), conn_id, capacity);

    let (stop_tx, stop_rx) = oneshot::channel();
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        outbound,
        stop_rx,
        ping_interval,
    ));

    router.connect(&client).await;

    let result = read_loop(&conn, &router, &client).await;

    router.disconnect(&client).await;
    let _ = stop_tx.send(());
    if let Err(e) = writer.await {
        tracing::debug!(%conn_id, error = %e, "writer task ended abnormally");
    }
    let _ = conn.close().await;

    tracing::info!(%conn_id, username = %client.username(), "client disconnected");
    result
}

/// Feeds inbound frames to the router until the connection ends.
async fn read_loop<S, E>(
    conn: &WebSocketConnection,
    router: &Router<S, E>,
    client: &ClientHandle,
) -> Result<(), FourfoldError>
where
    S: PlayerStore,
    E: EventSink,
{
    loop {
        match conn.recv().await {
            Ok(Some(frame)) => router.handle_frame(client, &frame).await,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "recv error");
                return Err(e.into());
            }
        }
    }
}

/// Drains the client's outbound queue onto the socket and keeps the peer
/// alive with pings.
async fn write_loop(
    conn: Arc<WebSocketConnection>,
    mut outbound: broadcast::Receiver<ServerMessage>,
    mut stop: oneshot::Receiver<()>,
    ping_interval: Duration,
) {
    let codec = JsonCodec;
    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + ping_interval,
        ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            msg = outbound.recv() => match msg {
                Ok(msg) => {
                    if write(&conn, &codec, msg).await.is_err() {
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        conn_id = %conn.id(),
                        skipped,
                        "outbound queue full, dropped oldest messages"
                    );
                }
                Err(RecvError::Closed) => return,
            },
            _ = &mut stop => {
                // Flush whatever is already queued, then stop.
                while let Ok(msg) = outbound.try_recv() {
                    if write(&conn, &codec, msg).await.is_err() {
                        break;
                    }
                }
                return;
            }
            _ = ping.tick() => {
                if let Err(e) = conn.ping().await {
                    tracing::debug!(conn_id = %conn.id(), error = %e, "ping failed");
                    return;
                }
            }
        }
    }
}

async fn write(
    conn: &WebSocketConnection,
    codec: &JsonCodec,
    msg: ServerMessage,
) -> Result<(), FourfoldError> {
    let bytes = codec.encode(&Envelope::now(msg))?;
    conn.send(&bytes).await.map_err(|e| {
        tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
        FourfoldError::Transport(e)
    })
}
