//! Error types for the room layer.

use tutti_protocol::{Phase, PlayerId, RoomCode};
use tutti_transport::ConnectionId;

use crate::Operation;

/// Errors that can occur during room operations.
///
/// All of them are recoverable. Only join and rejoin failures reach the
/// client; everything else is client noise and gets logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// A new player tried to enter a room that left the lobby.
    #[error("room {0} has already started")]
    GameAlreadyStarted(RoomCode),

    /// Every seat is taken.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The room's phase does not accept this operation.
    #[error("{operation} is not allowed during {phase}")]
    InvalidPhase { phase: Phase, operation: Operation },

    /// A ballot arrived for someone other than the open target, or while
    /// no ballot is open.
    #[error("no open ballot for player {0}")]
    WrongTarget(PlayerId),

    /// Only the host may do this.
    #[error("player {0} is not the host")]
    NotHost(PlayerId),

    /// The player has no seat in this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomCode),

    /// The connection is not seated anywhere.
    #[error("connection {0} is not in any room")]
    UnknownConnection(ConnectionId),

    /// The room actor stopped or its queue closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    /// Every generated code collided with a live room.
    #[error("no free room code after {0} attempts")]
    CodeSpaceExhausted(usize),
}

impl RoomError {
    /// Stable machine-readable code for logs and client errors.
    pub fn code(&self) -> &'static str {
        match self {
            RoomError::NotFound(_) => "ROOM_NOT_FOUND",
            RoomError::GameAlreadyStarted(_) => "GAME_ALREADY_STARTED",
            RoomError::RoomFull(_) => "ROOM_FULL",
            RoomError::InvalidPhase { .. } => "INVALID_PHASE",
            RoomError::WrongTarget(_) => "WRONG_TARGET",
            RoomError::NotHost(_) => "NOT_HOST",
            RoomError::NotInRoom(..) => "NOT_IN_ROOM",
            RoomError::UnknownConnection(_) => "UNKNOWN_CONNECTION",
            RoomError::Unavailable(_) => "ROOM_UNAVAILABLE",
            RoomError::CodeSpaceExhausted(_) => "CODE_SPACE_EXHAUSTED",
        }
    }
}
