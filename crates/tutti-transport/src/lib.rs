//! Transport layer for the Tutti game server.
//!
//! The game core never touches sockets. It only needs an opaque
//! [`ConnectionId`] to remember which connection currently speaks for a
//! player. This crate provides that identity plus a WebSocket transport
//! whose connections split into an independent [`FrameReader`] and
//! [`FrameWriter`], so the server can push broadcasts while a read is
//! pending.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    WebSocketConnection, WebSocketReader, WebSocketTransport, WebSocketWriter,
};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a transport connection.
///
/// A player keeps their identity across connections; the connection id is
/// what changes when they drop and come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One unit read from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An application payload.
    Data(Vec<u8>),
    /// A ping or pong from the peer. Carries nothing for the application
    /// but proves the peer is still there.
    Heartbeat,
}

/// Accepts new incoming connections.
pub trait Transport: Send + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, TransportError>;

    /// The address the transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// An accepted connection, ready to be split into its two directions.
pub trait Connection: Send + 'static {
    /// The receiving half.
    type Reader: FrameReader;
    /// The sending half.
    type Writer: FrameWriter;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Splits the connection so reading and writing can happen on
    /// different tasks.
    fn into_split(self) -> (Self::Reader, Self::Writer);
}

/// Receiving half of a connection.
pub trait FrameReader: Send + 'static {
    /// Receives the next frame from the peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError>;
}

/// Sending half of a connection.
pub trait FrameWriter: Send + 'static {
    /// Sends one frame to the peer.
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Sends a transport-level ping. Peers answer with a pong, which the
    /// reader reports as [`Frame::Heartbeat`].
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Closes the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_orders_by_value() {
        let mut ids = vec![ConnectionId::new(3), ConnectionId::new(1)];
        ids.sort();
        assert_eq!(ids, vec![ConnectionId::new(1), ConnectionId::new(3)]);
    }
}
