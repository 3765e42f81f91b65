//! Game configuration shared by every room a server hosts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for one game.
///
/// Every room created by a registry gets a copy; changing the registry's
/// config later does not affect live rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Rounds per game. Finishing this round ends the game.
    pub max_rounds: u32,

    /// Seats per room. Joins beyond this are refused.
    pub max_players: usize,

    /// Writing time advertised to clients as `endTime`. The server does
    /// not enforce it.
    pub round_duration: Duration,

    /// Pause between one ballot's result and the next target's ballot.
    pub vote_reveal_delay: Duration,

    /// Capacity of each room actor's command queue.
    pub command_buffer: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            max_players: 12,
            round_duration: Duration::from_secs(180),
            vote_reveal_delay: Duration::from_secs(3),
            command_buffer: 64,
        }
    }
}
