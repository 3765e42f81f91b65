//! Core types of the Tutti wire format.
//!
//! Field names are camelCase on the wire; the browser client is written
//! in JavaScript and reads them as-is.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable, client-generated player identifier.
///
/// The client keeps it in local storage and sends it again on reconnect,
/// which is how a dropped player gets their seat back. The server never
/// invents one.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short room code players type in to join (e.g. `"K3Z9Q"`).
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A player's answers for one round: category → word.
pub type AnswerSheet = BTreeMap<String, String>;

/// A voter's verdict on one target: category → valid?
pub type Ballot = BTreeMap<String, bool>;

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who should receive a server event.
///
/// Room logic returns `(Recipient, ServerEvent)` pairs; delivery is the
/// server's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected player in the room.
    All,
    /// One specific player.
    Player(PlayerId),
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where a room is in its lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Waiting for the host to start; new players may join.
    #[default]
    Lobby,
    /// Players are writing answers.
    Playing,
    /// Someone called stop; waiting for every sheet.
    CollectingAnswers,
    /// Peers are judging one target's answers at a time.
    Voting,
    /// Round finished; leaderboard on screen.
    RoundResults,
    /// The last round finished.
    GameOver,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Lobby => "LOBBY",
            Phase::Playing => "PLAYING",
            Phase::CollectingAnswers => "COLLECTING_ANSWERS",
            Phase::Voting => "VOTING",
            Phase::RoundResults => "ROUND_RESULTS",
            Phase::GameOver => "GAME_OVER",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Public view of a player, as shown in lobbies and leaderboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub connected: bool,
}

/// The player whose answers are currently being judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetPlayer {
    pub id: PlayerId,
    pub name: String,
}

/// Outcome of one category for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryVerdict {
    pub category: String,
    /// The trimmed word, `None` when the player left it blank.
    pub word: Option<String>,
    pub valid: bool,
    pub votes_for: u32,
    pub votes_against: u32,
}

/// One player's line in a round summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundDetail {
    pub id: PlayerId,
    pub name: String,
    pub answers: AnswerSheet,
    pub validations: BTreeMap<String, bool>,
    pub round_score: u32,
    pub total_score: u32,
}

/// Archived summary of a finished round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub round: u32,
    pub letter: char,
    pub details: Vec<RoundDetail>,
}

/// Snapshot of the current round, sent on reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundData {
    pub round: u32,
    /// `None` before the first round starts.
    pub letter: Option<char>,
    /// Unix milliseconds; `0` before the first round starts.
    pub end_time: u64,
    pub categories: Vec<String>,
}

/// Snapshot of an open ballot, sent on reconnect during voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingState {
    pub target_player: TargetPlayer,
    pub answers: AnswerSheet,
    pub voters: Vec<PlayerId>,
    pub total_needed: usize,
}
