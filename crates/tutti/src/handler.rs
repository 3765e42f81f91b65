//! Per-connection handler: decode client events and route them.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Split the socket; a writer task drains the connection's outbound
//!      channel, which room actors also hold a sender for
//!   2. Loop: receive frames → decode + validate → dispatch. Heartbeats
//!      (transport pings and pongs) only reset the idle timeout
//!   3. On exit, the guard tells the registry the connection is gone

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tutti_protocol::{ClientEvent, Codec, PlayerId, RoomCode, ServerEvent};
use tutti_room::{ConnectionSender, JoinIntent, PlayerAction, RoomError, unix_millis};
use tutti_transport::{
    Connection, ConnectionId, Frame, FrameReader, FrameWriter, WebSocketConnection,
    WebSocketWriter,
};

use crate::TuttiError;
use crate::server::ServerState;

/// Error code attached to failed rejoin attempts.
const REJOIN_FAILED: &str = "REJOIN_FAILED";

/// Drop guard that releases the connection's seat when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct ConnectionGuard<C: Codec> {
    connection: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for ConnectionGuard<C> {
    fn drop(&mut self) {
        let connection = self.connection;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let result = state.registry.lock().await.disconnect(connection).await;
            match result {
                Ok(seat) => {
                    tracing::debug!(%connection, room = %seat.room, player_id = %seat.player_id, "seat released");
                }
                Err(RoomError::UnknownConnection(_)) => {}
                Err(e) => {
                    tracing::debug!(%connection, error = %e, "disconnect failed");
                }
            }
        });
    }
}

/// Handles a single connection from accept to close.
///
/// Returns the transport or protocol error that ended the connection, if
/// any. A clean close or an idle timeout is `Ok`.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), TuttiError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (mut reader, writer) = conn.into_split();
    let (outbound, events) = mpsc::unbounded_channel();
    let (close_tx, close_rx) = oneshot::channel();
    let mut writer_task = spawn_writer(writer, events, close_rx, Arc::clone(&state), conn_id);
    let mut writer_done = false;

    let _guard = ConnectionGuard {
        connection: conn_id,
        state: Arc::clone(&state),
    };

    let result = loop {
        let next = tokio::select! {
            joined = &mut writer_task => {
                writer_done = true;
                // Err here means the writer panicked
                break joined.unwrap_or(Ok(()));
            }
            next = tokio::time::timeout(state.connection_timeout, reader.recv()) => next,
        };

        let data = match next {
            Ok(Ok(Some(Frame::Data(data)))) => data,
            // transport heartbeat: the peer is alive, nothing to decode
            Ok(Ok(Some(Frame::Heartbeat))) => continue,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break Ok(());
            }
            Ok(Err(e)) => break Err(e.into()),
            Err(_) => {
                tracing::info!(%conn_id, "connection timed out");
                break Ok(());
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode event");
                continue;
            }
        };
        if let Err(e) = event.validate() {
            tracing::debug!(%conn_id, event = event.name(), error = %e, "invalid event dropped");
            continue;
        }

        handle_event(&state, conn_id, &outbound, event).await;
    };

    if !writer_done {
        let _ = close_tx.send(());
        if let Ok(Err(e)) = writer_task.await {
            tracing::debug!(%conn_id, error = %e, "writer failed while closing");
        }
    }
    // _guard drops here → seat released.
    result
}

/// Forwards outbound events to the socket until the handler signals close
/// or every sender is gone. Pings the peer every half `connection_timeout`
/// so clients that only listen still produce heartbeats.
fn spawn_writer<C: Codec>(
    mut writer: WebSocketWriter,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
    mut close: oneshot::Receiver<()>,
    state: Arc<ServerState<C>>,
    conn_id: ConnectionId,
) -> JoinHandle<Result<(), TuttiError>> {
    tokio::spawn(async move {
        let period = (state.connection_timeout / 2).max(Duration::from_millis(1));
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);

        let result = loop {
            let event = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break Ok(()),
                },
                _ = heartbeat.tick() => {
                    if let Err(e) = writer.ping().await {
                        break Err(TuttiError::from(e));
                    }
                    continue;
                }
                _ = &mut close => break Ok(()),
            };

            let bytes = match state.codec.encode(&event) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(%conn_id, event = event.name(), error = %e, "failed to encode event");
                    break Err(e.into());
                }
            };
            if let Err(e) = writer.send(&bytes).await {
                break Err(e.into());
            }
        };
        let _ = writer.close().await;
        result
    })
}

/// Dispatches one validated client event.
async fn handle_event<C: Codec>(
    state: &Arc<ServerState<C>>,
    conn_id: ConnectionId,
    outbound: &ConnectionSender,
    event: ClientEvent,
) {
    match event {
        ClientEvent::CreateRoom {
            player_name,
            player_id,
        } => {
            let result = state
                .registry
                .lock()
                .await
                .create_room(player_id, &player_name, conn_id, outbound.clone())
                .await;
            if let Err(e) = result {
                tracing::warn!(%conn_id, error = %e, "room creation failed");
                let _ = outbound.send(ServerEvent::error_with_code("Could not create room", e.code()));
            }
        }

        ClientEvent::JoinRoom {
            code,
            player_name,
            player_id,
        } => {
            let result = join(state, conn_id, outbound, &code, player_id, &player_name, JoinIntent::Join).await;
            if let Err(e) = result {
                tracing::debug!(%conn_id, room = %code, error = %e, "join refused");
                let _ = outbound.send(ServerEvent::error_with_code(join_error_message(&e), e.code()));
            }
        }

        ClientEvent::RejoinRequest {
            player_id,
            room_code,
            player_name,
        } => {
            let result = join(state, conn_id, outbound, &room_code, player_id, &player_name, JoinIntent::Rejoin).await;
            if let Err(e) = result {
                tracing::debug!(%conn_id, room = %room_code, error = %e, "rejoin refused");
                let _ = outbound.send(ServerEvent::error_with_code("Could not rejoin room", REJOIN_FAILED));
            }
        }

        ClientEvent::StartGame { code } => {
            route(state, conn_id, &code, PlayerAction::StartRound).await;
        }
        ClientEvent::StopRound { code } => {
            route(state, conn_id, &code, PlayerAction::StopRound).await;
        }
        ClientEvent::SubmitAnswers { code, answers } => {
            route(state, conn_id, &code, PlayerAction::SubmitAnswers(answers)).await;
        }
        ClientEvent::SubmitVotes {
            code,
            target_player_id,
            votes,
        } => {
            let action = PlayerAction::SubmitVotes {
                target: target_player_id,
                ballot: votes,
            };
            route(state, conn_id, &code, action).await;
        }
        ClientEvent::ResetGame { code } => {
            route(state, conn_id, &code, PlayerAction::ResetGame).await;
        }

        ClientEvent::Ping {} => {
            let _ = outbound.send(ServerEvent::Pong {
                server_time: unix_millis(),
            });
        }
    }
}

async fn join<C: Codec>(
    state: &Arc<ServerState<C>>,
    conn_id: ConnectionId,
    outbound: &ConnectionSender,
    code: &RoomCode,
    player_id: PlayerId,
    player_name: &str,
    intent: JoinIntent,
) -> Result<(), RoomError> {
    state
        .registry
        .lock()
        .await
        .join(code, player_id, player_name, conn_id, outbound.clone(), intent)
        .await
        .map(|_| ())
}

/// Routes a game action. Rejections are client noise: logged, never
/// answered.
async fn route<C: Codec>(
    state: &Arc<ServerState<C>>,
    conn_id: ConnectionId,
    code: &RoomCode,
    action: PlayerAction,
) {
    // PERF: the registry lock is held while the room actor answers.
    // Room actors never take it, so this only serialises routing.
    let result = state.registry.lock().await.route(conn_id, code, action).await;
    if let Err(e) = result {
        tracing::debug!(%conn_id, room = %code, reason = e.code(), error = %e, "action dropped");
    }
}

/// The message a client sees when a join is refused.
fn join_error_message(err: &RoomError) -> &'static str {
    match err {
        RoomError::GameAlreadyStarted(_) => "Game already started",
        RoomError::RoomFull(_) => "Room is full",
        _ => "Room not found",
    }
}
