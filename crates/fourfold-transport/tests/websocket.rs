//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener and a tokio-tungstenite client so the
//! handshake, frame limits, and close handling are exercised end to end.

#[cfg(feature = "websocket")]
mod websocket {
    use std::net::SocketAddr;
    use std::time::Duration;

    use fourfold_transport::{
        Connection, Handshake, Transport, TransportError,
        WebSocketConnection, WebSocketTransport, WsConfig,
    };
    use futures_util::{SinkExt, StreamExt};
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on an OS-assigned port and accepts exactly one connection in
    /// the background.
    async fn serve_one(
        config: WsConfig,
    ) -> (
        SocketAddr,
        JoinHandle<Result<WebSocketConnection, TransportError>>,
    ) {
        let mut transport =
            WebSocketTransport::bind_with_config("127.0.0.1:0", config)
                .await
                .expect("should bind");
        let addr = transport.local_addr().expect("should have addr");
        let handle = tokio::spawn(async move {
            let pending = transport.accept().await?;
            pending.upgrade().await
        });
        (addr, handle)
    }

    async fn connect(addr: SocketAddr, path: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}{path}"))
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (addr, server) = serve_one(WsConfig::default()).await;

        let mut client = connect(addr, "/ws?username=alice").await;
        let conn = server.await.unwrap().expect("should accept");

        assert!(conn.id().into_inner() > 0);
        assert_eq!(conn.username(), "alice");

        // Server → client: UTF-8 payloads go out as text frames.
        conn.send(br#"{"type":"error"}"#).await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_data().as_ref(), br#"{"type":"error"}"#);

        // Client → server.
        client
            .send(Message::Text(r#"{"type":"leave_game"}"#.into()))
            .await
            .unwrap();
        let received = conn.recv().await.expect("recv").expect("data");
        assert_eq!(received, br#"{"type":"leave_game"}"#);

        conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (addr, server) = serve_one(WsConfig::default()).await;

        let mut client = connect(addr, "/ws?username=bob").await;
        let conn = server.await.unwrap().expect("should accept");

        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_rejects_missing_username() {
        let (addr, server) = serve_one(WsConfig::default()).await;

        let result =
            tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await;
        assert!(result.is_err(), "upgrade without username must fail");

        let accepted = server.await.unwrap();
        assert!(matches!(
            accepted,
            Err(TransportError::HandshakeRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_websocket_rejects_reserved_username() {
        let config = WsConfig {
            reserved_usernames: vec!["Bot".to_string()],
            ..WsConfig::default()
        };
        let (addr, server) = serve_one(config).await;

        let result =
            tokio_tungstenite::connect_async(format!("ws://{addr}/ws?username=bot"))
                .await;
        assert!(result.is_err(), "reserved name must be refused");
        assert!(matches!(
            server.await.unwrap(),
            Err(TransportError::HandshakeRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_websocket_silent_socket_times_out_handshake() {
        let config = WsConfig {
            handshake_timeout: Duration::from_millis(100),
            ..WsConfig::default()
        };
        let (addr, server) = serve_one(config).await;

        let _silent = tokio::net::TcpStream::connect(addr).await.unwrap();

        let accepted = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("handshake should give up")
            .unwrap();
        assert!(matches!(accepted, Err(TransportError::HandshakeTimedOut)));
    }

    #[tokio::test]
    async fn test_websocket_silent_socket_does_not_block_next_accept() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap();

        let _silent = tokio::net::TcpStream::connect(addr).await.unwrap();
        let stalled = transport.accept().await.expect("tcp accept");
        let stalled = tokio::spawn(stalled.upgrade());

        let client = tokio::spawn(async move { connect(addr, "/ws?username=alice").await });
        let pending = transport.accept().await.expect("tcp accept");
        let conn = tokio::time::timeout(Duration::from_secs(2), pending.upgrade())
            .await
            .expect("second handshake should not wait on the first")
            .expect("should upgrade");

        assert_eq!(conn.username(), "alice");
        drop(client.await.unwrap());
        assert!(!stalled.is_finished());
        stalled.abort();
    }

    #[tokio::test]
    async fn test_websocket_oversized_frame_fails_recv() {
        let config = WsConfig {
            max_message_size: 64,
            ..WsConfig::default()
        };
        let (addr, server) = serve_one(config).await;

        let mut client = connect(addr, "/ws?username=carol").await;
        let conn = server.await.unwrap().expect("should accept");

        client
            .send(Message::Text("x".repeat(1024).into()))
            .await
            .unwrap();

        assert!(conn.recv().await.is_err(), "oversized frame must error");
    }

    #[tokio::test]
    async fn test_websocket_idle_connection_reads_as_closed() {
        let config = WsConfig {
            idle_timeout: Some(Duration::from_millis(100)),
            ..WsConfig::default()
        };
        let (addr, server) = serve_one(config).await;

        let _client = connect(addr, "/ws?username=dave").await;
        let conn = server.await.unwrap().expect("should accept");

        let result = conn.recv().await.expect("idle is not an error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_pong_keeps_connection_alive() {
        let config = WsConfig {
            idle_timeout: Some(Duration::from_millis(300)),
            ..WsConfig::default()
        };
        let (addr, server) = serve_one(config).await;

        let mut client = connect(addr, "/ws?username=erin").await;
        let conn = server.await.unwrap().expect("should accept");

        // Pongs alone, then a real frame after the first window has passed.
        let sender = tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(150)).await;
                client.send(Message::Pong(Vec::new().into())).await.unwrap();
            }
            client.send(Message::Text("hi".into())).await.unwrap();
            client
        });

        let received = conn.recv().await.expect("recv").expect("data");
        assert_eq!(received, b"hi");
        drop(sender.await.unwrap());
    }
}
