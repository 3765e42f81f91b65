//! Room registry: creates rooms, tracks which connection sits where, and
//! routes player actions to the right room actor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tutti_protocol::{PlayerId, RoomCode};
use tutti_transport::ConnectionId;

use crate::actor::{ConnectionSender, PlayerAction, RoomHandle, RoomInfo, spawn_room};
use crate::room::{JoinIntent, JoinOutcome, Room};
use crate::{GameConfig, GamePools, RandomPools, RoomError};

/// Fresh codes tried before giving up on room creation.
const MAX_CODE_ATTEMPTS: usize = 32;

/// Where a connection is seated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub room: RoomCode,
    pub player_id: PlayerId,
}

/// All live rooms, keyed by code, plus the connection → seat index.
///
/// A connection is seated in at most one room at a time. Players are
/// never removed from a room; a dropped connection only loses its seat
/// mapping.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, RoomHandle>,
    connections: HashMap<ConnectionId, Seat>,
    config: GameConfig,
    pools: Arc<dyn GamePools>,
}

impl RoomRegistry {
    /// Creates an empty registry drawing from [`RandomPools`].
    pub fn new(config: GameConfig) -> Self {
        Self::with_pools(config, Arc::new(RandomPools))
    }

    /// Creates an empty registry with custom random pools.
    pub fn with_pools(config: GameConfig, pools: Arc<dyn GamePools>) -> Self {
        Self {
            rooms: HashMap::new(),
            connections: HashMap::new(),
            config,
            pools,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Opens a room in the lobby with the caller as host.
    ///
    /// A connection already seated elsewhere leaves that room first.
    ///
    /// # Errors
    /// `CodeSpaceExhausted` if no unused code turned up.
    pub async fn create_room(
        &mut self,
        player_id: PlayerId,
        player_name: &str,
        connection: ConnectionId,
        sender: ConnectionSender,
    ) -> Result<RoomCode, RoomError> {
        let code = self.fresh_code()?;
        self.detach(connection).await;

        let (room, opening) = Room::create(
            code.clone(),
            player_id.clone(),
            player_name,
            connection,
            self.pools.categories(),
            &self.config,
        );
        let handle = spawn_room(
            room,
            opening,
            connection,
            sender,
            Arc::clone(&self.pools),
            &self.config,
        );

        self.rooms.insert(code.clone(), handle);
        self.connections.insert(
            connection,
            Seat {
                room: code.clone(),
                player_id: player_id.clone(),
            },
        );
        tracing::info!(room = %code, %player_id, %connection, "room created");
        Ok(code)
    }

    fn fresh_code(&self) -> Result<RoomCode, RoomError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.pools.room_code();
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
        }
        Err(RoomError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Seats a player, or gives a returning player their seat back.
    ///
    /// On success the connection is mapped to the seat. If the player's
    /// previous connection was still attached, its mapping is dropped; if
    /// this connection sat somewhere else, it leaves that seat.
    ///
    /// # Errors
    /// `NotFound`, plus whatever the room refuses with
    /// (`GameAlreadyStarted`, `RoomFull`).
    pub async fn join(
        &mut self,
        code: &RoomCode,
        player_id: PlayerId,
        player_name: &str,
        connection: ConnectionId,
        sender: ConnectionSender,
        intent: JoinIntent,
    ) -> Result<JoinOutcome, RoomError> {
        let handle = self
            .rooms
            .get(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?
            .clone();

        let outcome = handle
            .join(
                player_id.clone(),
                player_name.to_owned(),
                connection,
                sender,
                intent,
            )
            .await?;

        let seat = Seat {
            room: code.clone(),
            player_id,
        };
        if self.connections.get(&connection) != Some(&seat) {
            self.detach(connection).await;
        }
        if let Some(previous) = outcome.previous_connection {
            self.connections.remove(&previous);
        }
        self.connections.insert(connection, seat);
        Ok(outcome)
    }

    /// Handles a closed connection: the player is marked disconnected and
    /// the mapping removed. Calling it twice is harmless.
    ///
    /// # Errors
    /// `UnknownConnection` if the connection was not seated, and
    /// `Unavailable` if its room actor is gone.
    pub async fn disconnect(&mut self, connection: ConnectionId) -> Result<Seat, RoomError> {
        let seat = self
            .connections
            .remove(&connection)
            .ok_or(RoomError::UnknownConnection(connection))?;
        if let Some(handle) = self.rooms.get(&seat.room) {
            handle.disconnect(seat.player_id.clone(), connection).await?;
        }
        Ok(seat)
    }

    /// Removes the connection's seat, if any, and tells the room.
    async fn detach(&mut self, connection: ConnectionId) {
        let Some(seat) = self.connections.remove(&connection) else {
            return;
        };
        if let Some(handle) = self.rooms.get(&seat.room) {
            let _ = handle.disconnect(seat.player_id, connection).await;
        }
    }

    /// Routes an action from a connection to the room it names.
    ///
    /// The named room must be the one the connection is seated in; the
    /// acting player is always the seat's player.
    ///
    /// # Errors
    /// `UnknownConnection`, `NotInRoom` when `code` is not the seat's
    /// room, `NotFound`, and whatever the room rejects.
    pub async fn route(
        &self,
        connection: ConnectionId,
        code: &RoomCode,
        action: PlayerAction,
    ) -> Result<(), RoomError> {
        let seat = self
            .connections
            .get(&connection)
            .ok_or(RoomError::UnknownConnection(connection))?;
        if seat.room != *code {
            return Err(RoomError::NotInRoom(seat.player_id.clone(), code.clone()));
        }
        let handle = self
            .rooms
            .get(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        handle.act(seat.player_id.clone(), action).await
    }

    /// Returns info about a specific room.
    pub async fn room_info(&self, code: &RoomCode) -> Result<RoomInfo, RoomError> {
        let handle = self
            .rooms
            .get(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        handle.info().await
    }

    /// Shuts a room down and forgets every seat in it.
    pub async fn destroy_room(&mut self, code: &RoomCode) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .remove(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        let _ = handle.shutdown().await;
        self.connections.retain(|_, seat| seat.room != *code);
        tracing::info!(room = %code, "room destroyed");
        Ok(())
    }

    /// Destroys rooms nobody is connected to that have been idle for at
    /// least `timeout`, and rooms whose actor already stopped. Returns
    /// the codes removed.
    pub async fn reap_idle(&mut self, timeout: Duration) -> Vec<RoomCode> {
        let mut doomed = Vec::new();
        for code in self.rooms.keys() {
            match self.room_info(code).await {
                Ok(info) if info.connected_count == 0 && info.idle_for >= timeout => {
                    doomed.push(code.clone());
                }
                Ok(_) => {}
                Err(_) => doomed.push(code.clone()),
            }
        }
        for code in &doomed {
            let _ = self.destroy_room(code).await;
        }
        if !doomed.is_empty() {
            tracing::info!(reaped = doomed.len(), remaining = self.room_count(), "idle rooms reaped");
        }
        doomed
    }

    /// Returns the number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}
