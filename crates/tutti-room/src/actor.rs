//! Room actor: an isolated Tokio task that owns one [`Room`].
//!
//! The outside world talks to it through a bounded mpsc channel. Commands
//! are handled one at a time and never await while the room is being
//! mutated, so operations on a room cannot interleave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tutti_protocol::{
    AnswerSheet, Ballot, Phase, PlayerId, Recipient, RoomCode, ServerEvent,
};
use tutti_transport::ConnectionId;

use crate::room::{JoinIntent, JoinOutcome, Outbound, Room, unix_millis};
use crate::{GameConfig, GamePools, RoomError};

/// Channel a connection handler reads its outgoing events from.
pub type ConnectionSender = mpsc::UnboundedSender<ServerEvent>;

/// A game action taken by a seated player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerAction {
    StartRound,
    StopRound,
    SubmitAnswers(AnswerSheet),
    SubmitVotes { target: PlayerId, ballot: Ballot },
    ResetGame,
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Seat a player (new or returning) on a connection.
    Join {
        player_id: PlayerId,
        player_name: String,
        connection: ConnectionId,
        sender: ConnectionSender,
        intent: JoinIntent,
        reply: oneshot::Sender<Result<JoinOutcome, RoomError>>,
    },

    /// A connection went away.
    Disconnect {
        player_id: PlayerId,
        connection: ConnectionId,
    },

    /// A player did something.
    Action {
        player_id: PlayerId,
        action: PlayerAction,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Request room metadata.
    GetInfo { reply: oneshot::Sender<RoomInfo> },

    /// Stop the actor.
    Shutdown,
}

/// A snapshot of room metadata.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub phase: Phase,
    pub round: u32,
    pub player_count: usize,
    pub connected_count: usize,
    /// Time since the last command reached the actor.
    pub idle_for: Duration,
}

// ---------------------------------------------------------------------------
// RoomHandle
// ---------------------------------------------------------------------------

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.code.clone())
    }

    /// Seats a player and registers the connection's outbound channel.
    pub async fn join(
        &self,
        player_id: PlayerId,
        player_name: String,
        connection: ConnectionId,
        sender: ConnectionSender,
        intent: JoinIntent,
    ) -> Result<JoinOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                player_id,
                player_name,
                connection,
                sender,
                intent,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Tells the room a connection is gone (fire-and-forget).
    pub async fn disconnect(
        &self,
        player_id: PlayerId,
        connection: ConnectionId,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Disconnect {
                player_id,
                connection,
            })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Runs a player action and waits for the verdict.
    pub async fn act(
        &self,
        player_id: PlayerId,
        action: PlayerAction,
    ) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Action {
                player_id,
                action,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Requests the current room info.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

// ---------------------------------------------------------------------------
// RoomActor
// ---------------------------------------------------------------------------

struct RoomActor {
    room: Room,
    pools: Arc<dyn GamePools>,
    /// Outbound channel per live connection.
    senders: HashMap<ConnectionId, ConnectionSender>,
    reveal_delay: Duration,
    /// When the next ballot opens, if one is waiting.
    reveal_at: Option<Instant>,
    last_activity: Instant,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(room = %self.room.code(), "room actor started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    // info queries from the reaper are not activity
                    if !matches!(cmd, RoomCommand::GetInfo { .. }) {
                        self.last_activity = Instant::now();
                    }
                    if !self.handle(cmd) {
                        break;
                    }
                }
                () = sleep_until(self.reveal_at) => {
                    self.reveal_at = None;
                    let events = self.room.open_next_ballot();
                    self.dispatch(events);
                    self.schedule_reveal();
                }
            }
        }

        tracing::info!(room = %self.room.code(), "room actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join {
                player_id,
                player_name,
                connection,
                sender,
                intent,
                reply,
            } => {
                let result =
                    self.handle_join(player_id, &player_name, connection, sender, intent);
                let _ = reply.send(result);
            }
            RoomCommand::Disconnect {
                player_id,
                connection,
            } => {
                let events = self.room.disconnect(&player_id, connection);
                // the same connection may have switched to another seat here
                if !self
                    .room
                    .players()
                    .iter()
                    .any(|p| p.connection == Some(connection))
                {
                    self.senders.remove(&connection);
                }
                if !events.is_empty() {
                    tracing::info!(
                        room = %self.room.code(),
                        %player_id,
                        %connection,
                        "player disconnected"
                    );
                }
                self.dispatch(events);
                self.schedule_reveal();
            }
            RoomCommand::Action {
                player_id,
                action,
                reply,
            } => {
                let result = self.handle_action(&player_id, action);
                let _ = reply.send(result);
            }
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                tracing::info!(room = %self.room.code(), "room shutting down");
                return false;
            }
        }
        true
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        player_name: &str,
        connection: ConnectionId,
        sender: ConnectionSender,
        intent: JoinIntent,
    ) -> Result<JoinOutcome, RoomError> {
        let (outcome, events) =
            self.room
                .join(player_id.clone(), player_name, connection, intent)?;

        if let Some(previous) = outcome.previous_connection {
            self.senders.remove(&previous);
        }
        self.senders.insert(connection, sender);

        tracing::info!(
            room = %self.room.code(),
            %player_id,
            %connection,
            rejoin = outcome.is_rejoin,
            players = self.room.players().len(),
            "player joined"
        );

        self.dispatch(events);
        Ok(outcome)
    }

    fn handle_action(
        &mut self,
        player_id: &PlayerId,
        action: PlayerAction,
    ) -> Result<(), RoomError> {
        let events = match action {
            PlayerAction::StartRound => {
                self.require_host(player_id)?;
                self.room.start_round(self.pools.as_ref(), unix_millis())?
            }
            PlayerAction::StopRound => self.room.stop_round(player_id)?,
            PlayerAction::SubmitAnswers(answers) => {
                self.room.submit_answers(player_id, answers)?
            }
            PlayerAction::SubmitVotes { target, ballot } => {
                self.room.submit_votes(player_id, &target, ballot)?
            }
            PlayerAction::ResetGame => {
                self.require_host(player_id)?;
                self.room.reset()?
            }
        };
        self.dispatch(events);
        self.schedule_reveal();
        Ok(())
    }

    fn require_host(&self, player_id: &PlayerId) -> Result<(), RoomError> {
        if self.room.is_host(player_id) {
            Ok(())
        } else {
            Err(RoomError::NotHost(player_id.clone()))
        }
    }

    /// Arms (or disarms) the reveal timer to match the room. With no
    /// delay configured, waiting ballots open right away.
    fn schedule_reveal(&mut self) {
        while self.room.awaiting_next_ballot() {
            if !self.reveal_delay.is_zero() {
                if self.reveal_at.is_none() {
                    self.reveal_at = Some(Instant::now() + self.reveal_delay);
                }
                return;
            }
            let events = self.room.open_next_ballot();
            self.dispatch(events);
        }
        self.reveal_at = None;
    }

    /// Delivers outbound events to the right connections.
    fn dispatch(&self, events: Vec<Outbound>) {
        for (recipient, event) in events {
            match recipient {
                Recipient::All => {
                    for player in self.room.players() {
                        self.send_to(player.connection, event.clone());
                    }
                }
                Recipient::Player(pid) => {
                    let connection =
                        self.room.player(&pid).and_then(|p| p.connection);
                    self.send_to(connection, event);
                }
            }
        }
    }

    /// Sends one event to a connection. Silently drops it if the
    /// connection is gone.
    fn send_to(&self, connection: Option<ConnectionId>, event: ServerEvent) {
        if let Some(sender) = connection.and_then(|c| self.senders.get(&c)) {
            let _ = sender.send(event);
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.room.code().clone(),
            phase: self.room.phase(),
            round: self.room.round(),
            player_count: self.room.players().len(),
            connected_count: self.room.connected_count(),
            idle_for: self.last_activity.elapsed(),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Spawns a room actor around a freshly created room.
///
/// `opening` is delivered before the actor starts taking commands, so the
/// creator sees `room_created` ahead of anything else.
pub(crate) fn spawn_room(
    room: Room,
    opening: Vec<Outbound>,
    host_connection: ConnectionId,
    host_sender: ConnectionSender,
    pools: Arc<dyn GamePools>,
    config: &GameConfig,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
    let code = room.code().clone();

    let actor = RoomActor {
        room,
        pools,
        senders: HashMap::from([(host_connection, host_sender)]),
        reveal_delay: config.vote_reveal_delay,
        reveal_at: None,
        last_activity: Instant::now(),
        receiver: rx,
    };
    actor.dispatch(opening);

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
