//! The room state machine.
//!
//! [`Room`] is plain synchronous state: every method mutates it and
//! returns the events to deliver as `(Recipient, ServerEvent)` pairs. The
//! actor in `actor.rs` owns one and does the delivery, so the game rules
//! can be tested without a runtime.

use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use tutti_protocol::{
    AnswerSheet, Ballot, Phase, PlayerId, PlayerView, Recipient, RoomCode,
    RoundData, RoundDetail, RoundRecord, ServerEvent, TargetPlayer,
    VotingState,
};
use tutti_transport::ConnectionId;

use crate::guard::{self, Operation};
use crate::pools::{FALLBACK_LETTER, GamePools};
use crate::tally::tally;
use crate::{GameConfig, RoomError};

/// An event and who should receive it.
pub type Outbound = (Recipient, ServerEvent);

/// Milliseconds since the Unix epoch, the unit clients use for `endTime`.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A seat in a room. Seats are never removed, only marked disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub connected: bool,
    /// The connection currently speaking for this player.
    pub connection: Option<ConnectionId>,
    round_results: BTreeMap<String, bool>,
    round_score: u32,
}

impl Player {
    fn new(id: PlayerId, name: &str, connection: ConnectionId) -> Self {
        Self {
            id,
            name: name.trim().to_owned(),
            score: 0,
            connected: true,
            connection: Some(connection),
            round_results: BTreeMap::new(),
            round_score: 0,
        }
    }

    /// Public view for `update_players` and leaderboards.
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            score: self.score,
            connected: self.connected,
        }
    }

    fn target(&self) -> TargetPlayer {
        TargetPlayer {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    /// Category verdicts from the ballot already settled this round.
    pub fn round_results(&self) -> &BTreeMap<String, bool> {
        &self.round_results
    }
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// How the client asked to enter the room. Both take an existing seat
/// back; they differ in what the client is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinIntent {
    /// `join_room`: answered with `room_joined`.
    Join,
    /// `rejoin_request`: answered with `state_restored`.
    Rejoin,
}

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The player already had a seat.
    pub is_rejoin: bool,
    /// The connection that spoke for the player before this join, if a
    /// different one was still attached.
    pub previous_connection: Option<ConnectionId>,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// One game: its players, phase, round data, and history.
#[derive(Debug, Clone)]
pub struct Room {
    code: RoomCode,
    host_id: PlayerId,
    /// Join order; also the voting rotation.
    players: Vec<Player>,
    phase: Phase,
    round: u32,
    config: GameConfig,
    categories: Vec<String>,
    used_letters: Vec<char>,
    current_letter: Option<char>,
    answers: HashMap<PlayerId, AnswerSheet>,
    round_votes: BTreeMap<PlayerId, Ballot>,
    voting_index: usize,
    /// `false` between a settled ballot and the next target's ballot.
    ballot_open: bool,
    round_end_time: u64,
    stop_called_by: Option<PlayerId>,
    history: Vec<RoundRecord>,
}

impl Room {
    /// Creates a room in the lobby with `host` as its only player.
    ///
    /// Returns the room and the events announcing it.
    pub fn create(
        code: RoomCode,
        host_id: PlayerId,
        host_name: &str,
        connection: ConnectionId,
        categories: Vec<String>,
        config: &GameConfig,
    ) -> (Self, Vec<Outbound>) {
        let room = Self {
            code: code.clone(),
            host_id: host_id.clone(),
            players: vec![Player::new(host_id.clone(), host_name, connection)],
            phase: Phase::Lobby,
            round: 0,
            config: config.clone(),
            categories,
            used_letters: Vec::new(),
            current_letter: None,
            answers: HashMap::new(),
            round_votes: BTreeMap::new(),
            voting_index: 0,
            ballot_open: false,
            round_end_time: 0,
            stop_called_by: None,
            history: Vec::new(),
        };
        let events = vec![
            (
                Recipient::Player(host_id.clone()),
                ServerEvent::RoomCreated {
                    code,
                    player_id: host_id,
                },
            ),
            room.update_players(),
        ];
        (room, events)
    }

    // -- Accessors --

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host_id(&self) -> &PlayerId {
        &self.host_id
    }

    pub fn is_host(&self, player_id: &PlayerId) -> bool {
        self.host_id == *player_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *player_id)
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.connected).count()
    }

    pub fn used_letters(&self) -> &[char] {
        &self.used_letters
    }

    pub fn current_letter(&self) -> Option<char> {
        self.current_letter
    }

    pub fn voting_index(&self) -> usize {
        self.voting_index
    }

    pub fn stop_called_by(&self) -> Option<&PlayerId> {
        self.stop_called_by.as_ref()
    }

    pub fn answers_of(&self, player_id: &PlayerId) -> Option<&AnswerSheet> {
        self.answers.get(player_id)
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    /// The player whose ballot is open, if any.
    pub fn current_target(&self) -> Option<&Player> {
        if self.phase == Phase::Voting && self.ballot_open {
            self.players.get(self.voting_index)
        } else {
            None
        }
    }

    /// A ballot was settled and the next one is waiting to open.
    pub fn awaiting_next_ballot(&self) -> bool {
        self.phase == Phase::Voting && !self.ballot_open
    }

    // -- Membership --

    /// Seats a new player or gives an existing one their seat back.
    ///
    /// An existing player always gets back in, whatever the phase; their
    /// name is refreshed and their score untouched. A new player needs
    /// the room to be in the lobby with a free seat.
    ///
    /// # Errors
    /// `GameAlreadyStarted` or `RoomFull` for new players.
    pub fn join(
        &mut self,
        player_id: PlayerId,
        player_name: &str,
        connection: ConnectionId,
        intent: JoinIntent,
    ) -> Result<(JoinOutcome, Vec<Outbound>), RoomError> {
        let outcome = if let Some(player) =
            self.players.iter_mut().find(|p| p.id == player_id)
        {
            let previous = player.connection.filter(|c| *c != connection);
            player.connected = true;
            player.connection = Some(connection);
            player.name = player_name.trim().to_owned();
            JoinOutcome {
                is_rejoin: true,
                previous_connection: previous,
            }
        } else {
            if self.phase != Phase::Lobby {
                return Err(RoomError::GameAlreadyStarted(self.code.clone()));
            }
            if self.players.len() >= self.config.max_players {
                return Err(RoomError::RoomFull(self.code.clone()));
            }
            self.players
                .push(Player::new(player_id.clone(), player_name, connection));
            JoinOutcome {
                is_rejoin: false,
                previous_connection: None,
            }
        };

        let mut events = Vec::new();
        match intent {
            JoinIntent::Join => {
                events.push((
                    Recipient::Player(player_id.clone()),
                    ServerEvent::RoomJoined {
                        code: self.code.clone(),
                        player_id: player_id.clone(),
                    },
                ));
                if outcome.is_rejoin {
                    events.extend(self.restore_events(&player_id));
                }
            }
            JoinIntent::Rejoin => events.extend(self.restore_events(&player_id)),
        }
        events.push(self.update_players());
        Ok((outcome, events))
    }

    /// Everything a (re)connecting player needs to rebuild their screen:
    /// `state_restored`, then the open ballot or the last round summary.
    pub fn restore_events(&self, player_id: &PlayerId) -> Vec<Outbound> {
        let to = || Recipient::Player(player_id.clone());
        let mut events = Vec::new();

        let voting_state = self.current_target().map(|target| VotingState {
            target_player: target.target(),
            answers: self.answers.get(&target.id).cloned().unwrap_or_default(),
            voters: self.counted_voters(&target.id),
            total_needed: self.eligible_voters(&target.id),
        });

        events.push((
            to(),
            ServerEvent::StateRestored {
                room_code: self.code.clone(),
                player_id: player_id.clone(),
                is_host: self.is_host(player_id),
                players: self.player_views(),
                state: self.phase,
                round_data: RoundData {
                    round: self.round,
                    letter: self.current_letter,
                    end_time: self.round_end_time,
                    categories: self.categories.clone(),
                },
                my_answers: self.answers.get(player_id).cloned().unwrap_or_default(),
                voting_state,
            },
        ));

        if let Some(target) = self.current_target() {
            events.push((to(), self.start_voting_event(target)));
        }

        if matches!(self.phase, Phase::RoundResults | Phase::GameOver) {
            let round_details = self
                .history
                .last()
                .map(|record| record.details.clone())
                .unwrap_or_default();
            events.push((to(), self.round_ended_event(round_details)));
        }

        events
    }

    /// Marks the player disconnected if `connection` still speaks for
    /// them. A stale connection (replaced by a rejoin) changes nothing.
    ///
    /// Pending answer collection and voting are re-evaluated, since the
    /// player no longer counts toward either.
    pub fn disconnect(
        &mut self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> Vec<Outbound> {
        let Some(player) = self
            .players
            .iter_mut()
            .find(|p| p.id == *player_id && p.connection == Some(connection))
        else {
            return Vec::new();
        };
        player.connected = false;
        player.connection = None;

        let mut events = vec![self.update_players()];
        events.extend(self.collect_if_complete());
        events.extend(self.settle_if_quorum());
        events
    }

    // -- Round loop --

    /// Starts the next round with a fresh letter.
    ///
    /// # Errors
    /// `InvalidPhase` outside the lobby and round results.
    pub fn start_round(
        &mut self,
        pools: &dyn GamePools,
        now_ms: u64,
    ) -> Result<Vec<Outbound>, RoomError> {
        guard::check(self.phase, Operation::StartRound)?;

        let letter = pools.letter(&self.used_letters);
        self.used_letters.push(letter);
        self.current_letter = Some(letter);
        self.answers.clear();
        self.round_votes.clear();
        self.clear_round_results();
        self.stop_called_by = None;
        self.voting_index = 0;
        self.ballot_open = false;
        self.phase = Phase::Playing;
        self.round += 1;
        self.round_end_time =
            now_ms + self.config.round_duration.as_millis() as u64;

        tracing::info!(room = %self.code, round = self.round, %letter, "round started");

        Ok(vec![(
            Recipient::All,
            ServerEvent::RoundStarted {
                round: self.round,
                letter,
                end_time: self.round_end_time,
                categories: self.categories.clone(),
            },
        )])
    }

    /// Someone called stop: everybody hands in their sheet.
    ///
    /// # Errors
    /// `NotInRoom` for strangers, `InvalidPhase` unless playing.
    pub fn stop_round(&mut self, caller: &PlayerId) -> Result<Vec<Outbound>, RoomError> {
        self.require_player(caller)?;
        guard::check(self.phase, Operation::StopRound)?;

        self.stop_called_by = Some(caller.clone());
        self.phase = Phase::CollectingAnswers;

        let mut events = vec![
            (
                Recipient::All,
                ServerEvent::RoundStopped {
                    stopped_by: caller.clone(),
                },
            ),
            (Recipient::All, ServerEvent::RequestAnswers {}),
        ];
        events.extend(self.collect_if_complete());
        Ok(events)
    }

    /// Stores (or replaces) a player's sheet. Keys that are not categories
    /// are dropped and words trimmed. Voting starts once every connected
    /// player has handed one in.
    ///
    /// # Errors
    /// `NotInRoom` for strangers, `InvalidPhase` outside the writing phases.
    pub fn submit_answers(
        &mut self,
        player_id: &PlayerId,
        answers: AnswerSheet,
    ) -> Result<Vec<Outbound>, RoomError> {
        self.require_player(player_id)?;
        guard::check(self.phase, Operation::SubmitAnswers)?;

        let sheet: AnswerSheet = answers
            .into_iter()
            .filter(|(category, _)| self.categories.contains(category))
            .map(|(category, word)| (category, word.trim().to_owned()))
            .filter(|(_, word)| !word.is_empty())
            .collect();
        self.answers.insert(player_id.clone(), sheet);

        Ok(self.collect_if_complete())
    }

    /// Records a ballot on the open target.
    ///
    /// The target may vote on themselves; the ballot is kept but never
    /// counted. Reaching the quorum settles the ballot on the spot.
    ///
    /// # Errors
    /// `NotInRoom`, `InvalidPhase` outside voting, and `WrongTarget` when
    /// `target` is not the open ballot (including the pause between
    /// ballots).
    pub fn submit_votes(
        &mut self,
        voter: &PlayerId,
        target: &PlayerId,
        ballot: Ballot,
    ) -> Result<Vec<Outbound>, RoomError> {
        self.require_player(voter)?;
        guard::check(self.phase, Operation::SubmitVotes)?;

        let current = self
            .current_target()
            .map(|p| p.id.clone())
            .ok_or_else(|| RoomError::WrongTarget(target.clone()))?;
        if current != *target {
            return Err(RoomError::WrongTarget(target.clone()));
        }

        let ballot: Ballot = ballot
            .into_iter()
            .filter(|(category, _)| self.categories.contains(category))
            .collect();
        self.round_votes.insert(voter.clone(), ballot);

        let mut events = vec![(
            Recipient::All,
            ServerEvent::VotingProgress {
                voters: self.counted_voters(&current),
                total_needed: self.eligible_voters(&current),
            },
        )];
        events.extend(self.settle_if_quorum());
        Ok(events)
    }

    /// Opens the ballot on the next target after a settled one.
    /// Does nothing unless [`awaiting_next_ballot`](Self::awaiting_next_ballot).
    pub fn open_next_ballot(&mut self) -> Vec<Outbound> {
        if !self.awaiting_next_ballot() {
            return Vec::new();
        }
        self.open_ballot()
    }

    /// Back to the lobby: scores, rounds, letters, and history are wiped.
    /// Players and categories stay.
    ///
    /// # Errors
    /// `InvalidPhase` when already in the lobby.
    pub fn reset(&mut self) -> Result<Vec<Outbound>, RoomError> {
        guard::check(self.phase, Operation::ResetGame)?;

        self.phase = Phase::Lobby;
        self.round = 0;
        self.used_letters.clear();
        self.current_letter = None;
        self.answers.clear();
        self.round_votes.clear();
        self.voting_index = 0;
        self.ballot_open = false;
        self.round_end_time = 0;
        self.stop_called_by = None;
        self.history.clear();
        for player in &mut self.players {
            player.score = 0;
        }
        self.clear_round_results();

        tracing::info!(room = %self.code, "game reset");

        Ok(vec![
            (
                Recipient::All,
                ServerEvent::GameReset {
                    categories: self.categories.clone(),
                },
            ),
            self.update_players(),
        ])
    }

    // -- Internals --

    fn require_player(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        if self.player(player_id).is_some() {
            Ok(())
        } else {
            Err(RoomError::NotInRoom(player_id.clone(), self.code.clone()))
        }
    }

    fn collect_if_complete(&mut self) -> Vec<Outbound> {
        if !matches!(self.phase, Phase::Playing | Phase::CollectingAnswers) {
            return Vec::new();
        }
        let mut connected = self.players.iter().filter(|p| p.connected).peekable();
        // nobody left to wait for; the reaper will collect the room
        if connected.peek().is_none() {
            return Vec::new();
        }
        if !connected.all(|p| self.answers.contains_key(&p.id)) {
            return Vec::new();
        }

        tracing::debug!(room = %self.code, round = self.round, "all answers in");
        self.phase = Phase::Voting;
        self.voting_index = 0;
        self.round_votes.clear();
        self.open_ballot()
    }

    fn open_ballot(&mut self) -> Vec<Outbound> {
        self.ballot_open = true;
        let mut events = Vec::new();
        if let Some(target) = self.players.get(self.voting_index) {
            events.push((Recipient::All, self.start_voting_event(target)));
        }
        events.extend(self.settle_if_quorum());
        events
    }

    fn settle_if_quorum(&mut self) -> Vec<Outbound> {
        let Some(target) = self.current_target() else {
            return Vec::new();
        };
        let target_id = target.id.clone();
        let quorum = self
            .players
            .iter()
            .filter(|p| p.connected && p.id != target_id)
            .all(|p| self.round_votes.contains_key(&p.id));
        if quorum {
            self.settle_ballot()
        } else {
            Vec::new()
        }
    }

    fn settle_ballot(&mut self) -> Vec<Outbound> {
        let index = self.voting_index;
        let Some(target_id) = self.players.get(index).map(|p| p.id.clone()) else {
            return Vec::new();
        };
        let result = tally(
            &self.categories,
            self.answers.get(&target_id),
            &self.round_votes,
            &target_id,
        );

        let player = &mut self.players[index];
        player.score += result.score;
        player.round_score = result.score;
        player.round_results = result.validations();
        let event = ServerEvent::PlayerRoundTotal {
            player: player.target(),
            round_score: result.score,
            total_score: player.score,
            details: result.verdicts,
        };

        tracing::debug!(
            room = %self.code,
            target = %target_id,
            round_score = result.score,
            "ballot settled"
        );

        self.round_votes.clear();
        self.voting_index += 1;
        self.ballot_open = false;

        let mut events = vec![(Recipient::All, event)];
        if self.voting_index >= self.players.len() {
            events.extend(self.finish_round());
        }
        events
    }

    fn finish_round(&mut self) -> Vec<Outbound> {
        let round_details: Vec<RoundDetail> = self
            .players
            .iter()
            .map(|p| RoundDetail {
                id: p.id.clone(),
                name: p.name.clone(),
                answers: self.answers.get(&p.id).cloned().unwrap_or_default(),
                validations: p.round_results.clone(),
                round_score: p.round_score,
                total_score: p.score,
            })
            .collect();

        self.history.push(RoundRecord {
            round: self.round,
            letter: self.current_letter.unwrap_or(FALLBACK_LETTER),
            details: round_details.clone(),
        });
        self.clear_round_results();

        let game_over = self.round >= self.config.max_rounds;
        self.phase = if game_over {
            Phase::GameOver
        } else {
            Phase::RoundResults
        };

        tracing::info!(room = %self.code, round = self.round, game_over, "round ended");

        vec![(Recipient::All, self.round_ended_event(round_details))]
    }

    fn clear_round_results(&mut self) {
        for player in &mut self.players {
            player.round_results.clear();
            player.round_score = 0;
        }
    }

    /// Non-target players whose ballot is recorded, in join order.
    fn counted_voters(&self, target: &PlayerId) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.id != *target && self.round_votes.contains_key(&p.id))
            .map(|p| p.id.clone())
            .collect()
    }

    /// Connected non-target players; the quorum.
    fn eligible_voters(&self, target: &PlayerId) -> usize {
        self.players
            .iter()
            .filter(|p| p.connected && p.id != *target)
            .count()
    }

    fn player_views(&self) -> Vec<PlayerView> {
        self.players.iter().map(Player::view).collect()
    }

    fn update_players(&self) -> Outbound {
        (
            Recipient::All,
            ServerEvent::UpdatePlayers {
                players: self.player_views(),
            },
        )
    }

    fn leaderboard(&self) -> Vec<PlayerView> {
        let mut board = self.player_views();
        // stable: ties keep join order
        board.sort_by(|a, b| b.score.cmp(&a.score));
        board
    }

    fn start_voting_event(&self, target: &Player) -> ServerEvent {
        ServerEvent::StartVotingPhase {
            target_player: target.target(),
            answers: self.answers.get(&target.id).cloned().unwrap_or_default(),
        }
    }

    fn round_ended_event(&self, round_details: Vec<RoundDetail>) -> ServerEvent {
        ServerEvent::RoundEnded {
            leaderboard: self.leaderboard(),
            is_game_over: self.round >= self.config.max_rounds,
            round_details,
            categories: self.categories.clone(),
        }
    }
}
