//! `FourfoldServer` builder and server loop.
//!
//! This is the entry point for running a Fourfold game server. It ties
//! together all the layers: transport → protocol → router → hub/queue.

use std::future::Future;
use std::net::SocketAddr;

use fourfold_transport::{Handshake, Transport, TransportError, WebSocketTransport};

use crate::config::ServerConfig;
use crate::events::{EventSink, LogEventSink};
use crate::handler::handle_connection;
use crate::router::Router;
use crate::store::{MemoryPlayerStore, PlayerStore};
use crate::FourfoldError;

/// Builder for configuring and starting a Fourfold server.
///
/// # Example
///
/// ```rust,no_run
/// use fourfold::prelude::*;
///
/// # async fn start() -> Result<(), FourfoldError> {
/// let server = FourfoldServer::builder()
///     .config(ServerConfig::from_env())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct FourfoldServerBuilder<S = MemoryPlayerStore, E = LogEventSink> {
    config: ServerConfig,
    bind_addr: Option<String>,
    store: S,
    events: E,
}

impl FourfoldServerBuilder {
    /// Creates a builder with default settings, an in-memory player store,
    /// and a logging event sink.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            bind_addr: None,
            store: MemoryPlayerStore::new(),
            events: LogEventSink,
        }
    }
}

impl Default for FourfoldServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, E> FourfoldServerBuilder<S, E> {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds here instead of the configured `host:port`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Where finished games are recorded.
    pub fn player_store<S2: PlayerStore>(
        self,
        store: S2,
    ) -> FourfoldServerBuilder<S2, E> {
        FourfoldServerBuilder {
            config: self.config,
            bind_addr: self.bind_addr,
            store,
            events: self.events,
        }
    }

    /// Where game events are published.
    pub fn event_sink<E2: EventSink>(
        self,
        events: E2,
    ) -> FourfoldServerBuilder<S, E2> {
        FourfoldServerBuilder {
            config: self.config,
            bind_addr: self.bind_addr,
            store: self.store,
            events,
        }
    }
}

impl<S: PlayerStore, E: EventSink> FourfoldServerBuilder<S, E> {
    /// Binds the listener and starts the hub and matchmaking actors.
    pub async fn build(self) -> Result<FourfoldServer<S, E>, FourfoldError> {
        let addr = self.bind_addr.unwrap_or_else(|| self.config.bind_addr());
        let transport =
            WebSocketTransport::bind_with_config(&addr, self.config.ws_config())
                .await?;

        let router = Router::spawn(&self.config, self.store, self.events);

        Ok(FourfoldServer {
            transport,
            router,
            config: self.config,
        })
    }
}

/// A bound Fourfold server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct FourfoldServer<S = MemoryPlayerStore, E = LogEventSink> {
    transport: WebSocketTransport,
    router: Router<S, E>,
    config: ServerConfig,
}

impl FourfoldServer {
    /// Creates a new builder.
    pub fn builder() -> FourfoldServerBuilder {
        FourfoldServerBuilder::new()
    }
}

impl<S: PlayerStore, E: EventSink> FourfoldServer<S, E> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, FourfoldError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn router(&self) -> &Router<S, E> {
        &self.router
    }

    /// Accepts connections until the process is terminated.
    pub async fn run(self) -> Result<(), FourfoldError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` completes, then stops the
    /// matchmaking queue and the hub.
    ///
    /// Connections already open keep their tasks; they end when the peer
    /// goes away.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), FourfoldError> {
        tracing::info!(
            path = %self.config.connection.path,
            "Fourfold server running"
        );
        let ping_interval = self.config.connection.ping_interval();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let router = self.router.clone();
                        tokio::spawn(async move {
                            // The handshake runs here, off the accept loop,
                            // so a stalled peer only delays itself.
                            let peer = pending.peer_addr();
                            let conn = match pending.upgrade().await {
                                Ok(conn) => conn,
                                Err(e @ (TransportError::HandshakeRejected(_)
                                | TransportError::HandshakeTimedOut)) => {
                                    tracing::debug!(%peer, error = %e, "upgrade refused");
                                    return;
                                }
                                Err(e) => {
                                    tracing::warn!(%peer, error = %e, "upgrade failed");
                                    return;
                                }
                            };
                            if let Err(e) =
                                handle_connection(conn, router, ping_interval).await
                            {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutting down");
        if let Err(e) = self.router.queue().shutdown().await {
            tracing::warn!(error = %e, "queue already stopped");
        }
        if let Err(e) = self.router.hub().shutdown().await {
            tracing::warn!(error = %e, "hub already stopped");
        }
        self.transport.shutdown().await?;
        Ok(())
    }
}
