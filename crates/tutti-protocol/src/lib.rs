//! Wire protocol for Tutti.
//!
//! Everything that crosses the socket lives here:
//!
//! - **Types** ([`PlayerId`], [`RoomCode`], [`Phase`], and the read-only
//!   views the server sends about players and rounds).
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): one JSON object per
//!   frame, shaped `{"event": "<name>", "data": {...}}`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]).
//! - **Errors** ([`ProtocolError`]).
//!
//! The protocol crate knows nothing about rooms or connections. The game
//! core produces `(Recipient, ServerEvent)` pairs and the server decides
//! which sockets they reach.

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod events;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{
    ClientEvent, MAX_PLAYER_ID_LEN, MAX_PLAYER_NAME_LEN, ServerEvent,
};
pub use types::{
    AnswerSheet, Ballot, CategoryVerdict, Phase, PlayerId, PlayerView,
    Recipient, RoomCode, RoundData, RoundDetail, RoundRecord, TargetPlayer,
    VotingState,
};
