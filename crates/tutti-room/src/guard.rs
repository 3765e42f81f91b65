//! Which operations each phase accepts.
//!
//! ```text
//! LOBBY ──start──▶ PLAYING ──stop──▶ COLLECTING_ANSWERS
//!                     │                     │
//!                     └──all answers in─────┴──▶ VOTING ⟲ (one ballot per player)
//!                                                  │
//!                      ┌──────── start ◀── ROUND_RESULTS
//!                      ▼                           │
//!                   PLAYING               last round ──▶ GAME_OVER
//! ```
//!
//! Reset is accepted everywhere except the lobby.

use std::fmt;

use tutti_protocol::Phase;

use crate::RoomError;

/// A player-initiated mutation of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    StartRound,
    StopRound,
    SubmitAnswers,
    SubmitVotes,
    ResetGame,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::StartRound => "start_round",
            Operation::StopRound => "stop_round",
            Operation::SubmitAnswers => "submit_answers",
            Operation::SubmitVotes => "submit_votes",
            Operation::ResetGame => "reset_game",
        };
        f.write_str(name)
    }
}

/// Returns `true` if `op` may run while the room is in `phase`.
pub fn permits(phase: Phase, op: Operation) -> bool {
    match op {
        Operation::StartRound => {
            matches!(phase, Phase::Lobby | Phase::RoundResults)
        }
        Operation::StopRound => phase == Phase::Playing,
        Operation::SubmitAnswers => {
            matches!(phase, Phase::Playing | Phase::CollectingAnswers)
        }
        Operation::SubmitVotes => phase == Phase::Voting,
        Operation::ResetGame => phase != Phase::Lobby,
    }
}

/// Like [`permits`], but as a `Result` for use with `?`.
pub(crate) fn check(phase: Phase, operation: Operation) -> Result<(), RoomError> {
    if permits(phase, operation) {
        Ok(())
    } else {
        Err(RoomError::InvalidPhase { phase, operation })
    }
}
