//! Integration tests for the WebSocket transport.
//!
//! A real listener on an OS-assigned port and a `tokio-tungstenite`
//! client on the other end.

#[cfg(feature = "websocket")]
mod websocket {
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;
    use tutti_transport::{
        Connection, Frame, FrameReader, FrameWriter, Transport, WebSocketTransport,
    };

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on a random port, connects one client, returns both ends.
    async fn connected_pair() -> (tutti_transport::WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("should have address");

        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("accept task should complete");
        (conn, client)
    }

    #[tokio::test]
    async fn test_websocket_send_and_receive_both_directions() {
        let (conn, mut client) = connected_pair().await;
        assert!(conn.id().into_inner() > 0);

        let (mut reader, mut writer) = conn.into_split();

        writer
            .send(br#"{"event":"pong"}"#)
            .await
            .expect("send should succeed");
        let msg = client.next().await.unwrap().unwrap();
        // UTF-8 payloads go out as text frames
        assert!(msg.is_text());
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"event":"pong"}"#);

        client
            .send(Message::text(r#"{"event":"ping","data":{}}"#.to_owned()))
            .await
            .unwrap();
        let received = reader.recv().await.expect("recv should succeed");
        assert_eq!(
            received,
            Some(Frame::Data(br#"{"event":"ping","data":{}}"#.to_vec()))
        );
    }

    #[tokio::test]
    async fn test_websocket_binary_frames_pass_through() {
        let (conn, mut client) = connected_pair().await;
        let (mut reader, mut writer) = conn.into_split();

        client
            .send(Message::binary(vec![0xff, 0x00, 0x10]))
            .await
            .unwrap();
        let received = reader.recv().await.unwrap();
        assert_eq!(received, Some(Frame::Data(vec![0xff, 0x00, 0x10])));

        writer.send(&[0xfe, 0xfd]).await.unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[0xfe, 0xfd]);
    }

    #[tokio::test]
    async fn test_websocket_client_close_yields_none() {
        let (conn, mut client) = connected_pair().await;
        let (mut reader, _writer) = conn.into_split();

        client.close(None).await.unwrap();

        let received = reader.recv().await.expect("clean close is not an error");
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_websocket_writer_usable_while_read_pending() {
        let (conn, mut client) = connected_pair().await;
        let (mut reader, mut writer) = conn.into_split();

        let pending_read = tokio::spawn(async move { reader.recv().await });

        writer.send(b"broadcast").await.unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"broadcast");

        client.send(Message::text("reply".to_owned())).await.unwrap();
        let received = pending_read.await.unwrap().unwrap();
        assert_eq!(received, Some(Frame::Data(b"reply".to_vec())));
    }

    #[tokio::test]
    async fn test_websocket_client_ping_is_a_heartbeat() {
        let (conn, mut client) = connected_pair().await;
        let (mut reader, _writer) = conn.into_split();

        client.send(Message::Ping(Default::default())).await.unwrap();

        let received = reader.recv().await.expect("ping is not an error");
        assert_eq!(received, Some(Frame::Heartbeat));
    }

    #[tokio::test]
    async fn test_websocket_server_ping_answered_with_heartbeat() {
        let (conn, mut client) = connected_pair().await;
        let (mut reader, mut writer) = conn.into_split();

        writer.ping().await.expect("ping should send");
        // reading makes the client queue and flush its pong
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_ping());
        client.flush().await.unwrap();

        let received = reader.recv().await.expect("pong is not an error");
        assert_eq!(received, Some(Frame::Heartbeat));
    }

    #[tokio::test]
    async fn test_websocket_connection_ids_are_unique() {
        let (a, _ca) = connected_pair().await;
        let (b, _cb) = connected_pair().await;
        assert_ne!(a.id(), b.id());
    }
}
