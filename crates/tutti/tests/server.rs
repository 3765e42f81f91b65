//! Integration tests for the Tutti server: real WebSocket clients against
//! a server bound on a random port.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;
use tutti::prelude::*;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Numbered room codes, one category, letters M, P, S.
#[derive(Default)]
struct ScriptedPools {
    next_room: AtomicUsize,
}

impl GamePools for ScriptedPools {
    fn room_code(&self) -> RoomCode {
        let n = self.next_room.fetch_add(1, Ordering::Relaxed);
        RoomCode::new(format!("ROOM{n}"))
    }

    fn categories(&self) -> Vec<String> {
        vec!["Animal".into()]
    }

    fn letter(&self, used: &[char]) -> char {
        ['M', 'P', 'S']
            .into_iter()
            .find(|c| !used.contains(c))
            .unwrap_or('A')
    }
}

/// Starts a server on a random port and returns the address.
async fn start_server_with(builder: TuttiServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .pools(Arc::new(ScriptedPools::default()))
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn start_server() -> String {
    let game = GameConfig {
        vote_reveal_delay: Duration::ZERO,
        ..GameConfig::default()
    };
    start_server_with(TuttiServerBuilder::new().game_config(game)).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, event: serde_json::Value) {
    ws.send(Message::text(event.to_string()))
        .await
        .expect("send event");
}

/// Receives the next server event, failing after two seconds.
async fn recv(ws: &mut ClientWs) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for an event")
            .expect("stream ended")
            .expect("recv failed");
        if msg.is_text() || msg.is_binary() {
            return serde_json::from_slice(&msg.into_data()).expect("decode event");
        }
    }
}

/// Skips events until one named `name` arrives.
async fn recv_until(ws: &mut ClientWs, name: &str) -> ServerEvent {
    loop {
        let event = recv(ws).await;
        if event.name() == name {
            return event;
        }
    }
}

async fn create_room(ws: &mut ClientWs, player_id: &str, name: &str) -> RoomCode {
    send(
        ws,
        json!({"event": "create_room", "data": {"playerName": name, "playerId": player_id}}),
    )
    .await;
    match recv(ws).await {
        ServerEvent::RoomCreated { code, .. } => code,
        other => panic!("expected room_created, got {other:?}"),
    }
}

async fn join_room(ws: &mut ClientWs, code: &RoomCode, player_id: &str, name: &str) {
    send(
        ws,
        json!({"event": "join_room", "data": {"code": code, "playerName": name, "playerId": player_id}}),
    )
    .await;
}

/// Host "a" and guest "b" in one room, with the lobby chatter drained.
async fn duo(addr: &str) -> (ClientWs, ClientWs, RoomCode) {
    let mut a = connect(addr).await;
    let code = create_room(&mut a, "a", "Ana").await;
    recv_until(&mut a, "update_players").await;

    let mut b = connect(addr).await;
    join_room(&mut b, &code, "b", "Beto").await;
    assert!(matches!(recv(&mut b).await, ServerEvent::RoomJoined { .. }));
    recv_until(&mut b, "update_players").await;
    recv_until(&mut a, "update_players").await;
    (a, b, code)
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_create_room_replies_with_code_and_players() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        json!({"event": "create_room", "data": {"playerName": "  Ana ", "playerId": "a"}}),
    )
    .await;

    match recv(&mut ws).await {
        ServerEvent::RoomCreated { code, player_id } => {
            assert_eq!(code, RoomCode::new("ROOM0"));
            assert_eq!(player_id, PlayerId::new("a"));
        }
        other => panic!("expected room_created, got {other:?}"),
    }
    match recv(&mut ws).await {
        ServerEvent::UpdatePlayers { players } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].name, "Ana");
            assert_eq!(players[0].score, 0);
            assert!(players[0].connected);
        }
        other => panic!("expected update_players, got {other:?}"),
    }
}

#[tokio::test]
async fn test_full_round_two_players() {
    let addr = start_server().await;
    let (mut a, mut b, code) = duo(&addr).await;

    send(&mut a, json!({"event": "start_game", "data": {"code": code}})).await;
    for ws in [&mut a, &mut b] {
        match recv_until(ws, "round_started").await {
            ServerEvent::RoundStarted {
                round,
                letter,
                categories,
                ..
            } => {
                assert_eq!(round, 1);
                assert_eq!(letter, 'M');
                assert_eq!(categories, vec!["Animal".to_string()]);
            }
            other => panic!("expected round_started, got {other:?}"),
        }
    }

    send(&mut b, json!({"event": "stop_round", "data": {"code": code}})).await;
    for ws in [&mut a, &mut b] {
        match recv_until(ws, "round_stopped").await {
            ServerEvent::RoundStopped { stopped_by } => assert_eq!(stopped_by, PlayerId::new("b")),
            other => panic!("expected round_stopped, got {other:?}"),
        }
        recv_until(ws, "request_answers").await;
    }

    for ws in [&mut a, &mut b] {
        send(
            ws,
            json!({"event": "submit_answers", "data": {"code": code, "answers": {"Animal": "Buho"}}}),
        )
        .await;
    }

    // first ballot: a's sheet, judged by b
    for ws in [&mut a, &mut b] {
        match recv_until(ws, "start_voting_phase").await {
            ServerEvent::StartVotingPhase {
                target_player,
                answers,
            } => {
                assert_eq!(target_player.id, PlayerId::new("a"));
                assert_eq!(answers.get("Animal").map(String::as_str), Some("Buho"));
            }
            other => panic!("expected start_voting_phase, got {other:?}"),
        }
    }
    send(
        &mut b,
        json!({"event": "submit_votes", "data": {"code": code, "targetPlayerId": "a", "votes": {"Animal": true}}}),
    )
    .await;
    match recv_until(&mut a, "player_round_total").await {
        ServerEvent::PlayerRoundTotal {
            player,
            round_score,
            total_score,
            ..
        } => {
            assert_eq!(player.id, PlayerId::new("a"));
            assert_eq!(round_score, 10);
            assert_eq!(total_score, 10);
        }
        other => panic!("expected player_round_total, got {other:?}"),
    }

    // second ballot: b's sheet, judged by a
    match recv_until(&mut a, "start_voting_phase").await {
        ServerEvent::StartVotingPhase { target_player, .. } => {
            assert_eq!(target_player.id, PlayerId::new("b"));
        }
        other => panic!("expected start_voting_phase, got {other:?}"),
    }
    send(
        &mut a,
        json!({"event": "submit_votes", "data": {"code": code, "targetPlayerId": "b", "votes": {"Animal": true}}}),
    )
    .await;

    for ws in [&mut a, &mut b] {
        match recv_until(ws, "round_ended").await {
            ServerEvent::RoundEnded {
                leaderboard,
                is_game_over,
                round_details,
                ..
            } => {
                let board: Vec<(String, u32)> = leaderboard
                    .iter()
                    .map(|p| (p.id.to_string(), p.score))
                    .collect();
                assert_eq!(board, vec![("a".to_string(), 10), ("b".to_string(), 10)]);
                assert!(!is_game_over);
                assert_eq!(round_details.len(), 2);
            }
            other => panic!("expected round_ended, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_join_unknown_room_errors() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    join_room(&mut ws, &RoomCode::new("NOPE1"), "b", "Beto").await;

    match recv(&mut ws).await {
        ServerEvent::Error { message, code } => {
            assert_eq!(message, "Room not found");
            assert_eq!(code.as_deref(), Some("ROOM_NOT_FOUND"));
        }
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_started_game_errors() {
    let addr = start_server().await;
    let (mut a, _b, code) = duo(&addr).await;

    send(&mut a, json!({"event": "start_game", "data": {"code": code}})).await;
    recv_until(&mut a, "round_started").await;

    let mut late = connect(&addr).await;
    join_room(&mut late, &code, "c", "Cata").await;

    match recv(&mut late).await {
        ServerEvent::Error { message, .. } => assert_eq!(message, "Game already started"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejoin_restores_state() {
    let addr = start_server().await;
    let (mut a, b, code) = duo(&addr).await;

    send(&mut a, json!({"event": "start_game", "data": {"code": code}})).await;
    recv_until(&mut a, "round_started").await;

    drop(b);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut b = connect(&addr).await;
    send(
        &mut b,
        json!({"event": "rejoin_request", "data": {"playerId": "b", "roomCode": code, "playerName": "Beto"}}),
    )
    .await;

    match recv(&mut b).await {
        ServerEvent::StateRestored {
            room_code,
            player_id,
            is_host,
            players,
            state,
            round_data,
            voting_state,
            ..
        } => {
            assert_eq!(room_code, code);
            assert_eq!(player_id, PlayerId::new("b"));
            assert!(!is_host);
            assert_eq!(players.len(), 2);
            assert_eq!(state, Phase::Playing);
            assert_eq!(round_data.round, 1);
            assert_eq!(round_data.letter, Some('M'));
            assert!(voting_state.is_none());
        }
        other => panic!("expected state_restored, got {other:?}"),
    }

    // everyone sees b connected again
    loop {
        match recv_until(&mut a, "update_players").await {
            ServerEvent::UpdatePlayers { players } => {
                if players.iter().all(|p| p.connected) {
                    break;
                }
            }
            other => panic!("expected update_players, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_rejoin_unknown_room_fails() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        json!({"event": "rejoin_request", "data": {"playerId": "b", "roomCode": "GONE1", "playerName": "Beto"}}),
    )
    .await;

    match recv(&mut ws).await {
        ServerEvent::Error { message, code } => {
            assert_eq!(message, "Could not rejoin room");
            assert_eq!(code.as_deref(), Some("REJOIN_FAILED"));
        }
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ping_pong() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"event": "ping", "data": {}})).await;

    match recv(&mut ws).await {
        ServerEvent::Pong { server_time } => assert!(server_time > 0),
        other => panic!("expected pong, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_frames_are_ignored() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::text("not json")).await.expect("send");
    send(&mut ws, json!({"event": "teleport", "data": {}})).await;
    send(
        &mut ws,
        json!({"event": "create_room", "data": {"playerName": "   ", "playerId": "a"}}),
    )
    .await;
    send(&mut ws, json!({"event": "ping", "data": {}})).await;

    // nothing answered the junk; the connection is still alive
    assert!(matches!(recv(&mut ws).await, ServerEvent::Pong { .. }));
}

#[tokio::test]
async fn test_rejected_actions_are_silent() {
    let addr = start_server().await;
    let (_a, mut b, code) = duo(&addr).await;

    // not the host
    send(&mut b, json!({"event": "start_game", "data": {"code": code}})).await;
    // not in that room
    send(&mut b, json!({"event": "stop_round", "data": {"code": "ROOM9"}})).await;
    // wrong phase
    send(
        &mut b,
        json!({"event": "submit_votes", "data": {"code": code, "targetPlayerId": "a", "votes": {}}}),
    )
    .await;
    send(&mut b, json!({"event": "ping", "data": {}})).await;

    assert!(matches!(recv(&mut b).await, ServerEvent::Pong { .. }));
}

#[tokio::test]
async fn test_reset_game_returns_to_lobby() {
    let addr = start_server().await;
    let (mut a, mut b, code) = duo(&addr).await;

    send(&mut a, json!({"event": "start_game", "data": {"code": code}})).await;
    recv_until(&mut b, "round_started").await;

    send(&mut a, json!({"event": "reset_game", "data": {"code": code}})).await;
    match recv_until(&mut b, "game_reset").await {
        ServerEvent::GameReset { categories } => {
            assert_eq!(categories, vec!["Animal".to_string()]);
        }
        other => panic!("expected game_reset, got {other:?}"),
    }

    // the lobby accepts newcomers again
    let mut c = connect(&addr).await;
    join_room(&mut c, &code, "c", "Cata").await;
    assert!(matches!(recv(&mut c).await, ServerEvent::RoomJoined { .. }));
}

#[tokio::test]
async fn test_silent_connection_times_out() {
    let builder = TuttiServerBuilder::new().connection_timeout(Duration::from_millis(100));
    let addr = start_server_with(builder).await;
    let mut ws = connect(&addr).await;

    // Not reading means the server's pings go unanswered.
    tokio::time::sleep(Duration::from_millis(600)).await;

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) => break,
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "server should close an idle connection");
}

#[tokio::test]
async fn test_websocket_pings_keep_connection_alive() {
    let builder = TuttiServerBuilder::new().connection_timeout(Duration::from_millis(300));
    let addr = start_server_with(builder).await;
    let mut ws = connect(&addr).await;

    for _ in 0..12 {
        ws.send(Message::Ping(Default::default()))
            .await
            .expect("send ping");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    send(&mut ws, json!({"event": "ping", "data": {}})).await;
    assert!(matches!(recv(&mut ws).await, ServerEvent::Pong { .. }));
}

#[tokio::test]
async fn test_listening_client_answers_server_pings() {
    let builder = TuttiServerBuilder::new().connection_timeout(Duration::from_millis(300));
    let addr = start_server_with(builder).await;
    let mut ws = connect(&addr).await;

    let deadline = tokio::time::Instant::now() + Duration::from_millis(600);
    let mut pings = 0;
    while let Ok(next) = tokio::time::timeout_at(deadline, ws.next()).await {
        let msg = next.expect("stream ended").expect("recv failed");
        assert!(!msg.is_close(), "server closed a listening client");
        if msg.is_ping() {
            pings += 1;
            ws.flush().await.expect("flush pong");
        }
    }
    assert!(pings >= 2, "expected server pings, saw {pings}");

    send(&mut ws, json!({"event": "ping", "data": {}})).await;
    assert!(matches!(recv(&mut ws).await, ServerEvent::Pong { .. }));
}
