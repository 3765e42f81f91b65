//! Unified error type for the Tutti server.

use tutti_protocol::ProtocolError;
use tutti_transport::TransportError;

/// Top-level error for starting the server and for a connection ending
/// abnormally.
///
/// Room errors never end a connection: join refusals are answered to the
/// client and everything else is dropped, so they stay [`RoomError`]s.
///
/// [`RoomError`]: tutti_room::RoomError
#[derive(Debug, thiserror::Error)]
pub enum TuttiError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
