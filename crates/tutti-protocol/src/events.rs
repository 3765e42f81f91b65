//! Events exchanged with clients.
//!
//! Every frame is an adjacently tagged object:
//!
//! ```text
//! {"event": "submit_votes", "data": {"code": "K3Z9Q", "targetPlayerId": "b", "votes": {"Animal": true}}}
//! ```
//!
//! Event names are snake_case, payload fields camelCase. Events without a
//! payload still carry `"data": {}` so clients can treat every event the
//! same way.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::types::{
    AnswerSheet, Ballot, CategoryVerdict, Phase, PlayerId, PlayerView,
    RoomCode, RoundData, RoundDetail, TargetPlayer, VotingState,
};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Everything a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Open a new room with the sender as host.
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        player_name: String,
        player_id: PlayerId,
    },

    /// Enter an existing room, or take back a seat already held.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        code: RoomCode,
        player_name: String,
        player_id: PlayerId,
    },

    /// Reconnect after a dropped socket; answered with `state_restored`.
    #[serde(rename_all = "camelCase")]
    RejoinRequest {
        player_id: PlayerId,
        room_code: RoomCode,
        player_name: String,
    },

    /// Host only: start the next round.
    StartGame { code: RoomCode },

    /// Call "stop" during the writing phase.
    StopRound { code: RoomCode },

    #[serde(rename_all = "camelCase")]
    SubmitAnswers { code: RoomCode, answers: AnswerSheet },

    #[serde(rename_all = "camelCase")]
    SubmitVotes {
        code: RoomCode,
        target_player_id: PlayerId,
        votes: Ballot,
    },

    /// Host only: back to the lobby with scores wiped.
    ResetGame { code: RoomCode },

    /// Keep-alive.
    Ping {},
}

/// Longest accepted player id, in characters.
pub const MAX_PLAYER_ID_LEN: usize = 64;
/// Longest accepted display name, in characters.
pub const MAX_PLAYER_NAME_LEN: usize = 32;

impl ClientEvent {
    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::CreateRoom { .. } => "create_room",
            ClientEvent::JoinRoom { .. } => "join_room",
            ClientEvent::RejoinRequest { .. } => "rejoin_request",
            ClientEvent::StartGame { .. } => "start_game",
            ClientEvent::StopRound { .. } => "stop_round",
            ClientEvent::SubmitAnswers { .. } => "submit_answers",
            ClientEvent::SubmitVotes { .. } => "submit_votes",
            ClientEvent::ResetGame { .. } => "reset_game",
            ClientEvent::Ping {} => "ping",
        }
    }

    /// Structural checks that serde cannot express.
    ///
    /// Player ids must be non-empty and at most [`MAX_PLAYER_ID_LEN`]
    /// characters; names must be non-blank and at most
    /// [`MAX_PLAYER_NAME_LEN`] characters once trimmed.
    ///
    /// # Errors
    /// Returns `ProtocolError::InvalidMessage` describing the first
    /// violated rule.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientEvent::CreateRoom {
                player_name,
                player_id,
            }
            | ClientEvent::JoinRoom {
                player_name,
                player_id,
                ..
            }
            | ClientEvent::RejoinRequest {
                player_name,
                player_id,
                ..
            } => {
                validate_player_id(player_id)?;
                validate_player_name(player_name)
            }
            ClientEvent::SubmitVotes {
                target_player_id, ..
            } => validate_player_id(target_player_id),
            ClientEvent::StartGame { .. }
            | ClientEvent::StopRound { .. }
            | ClientEvent::SubmitAnswers { .. }
            | ClientEvent::ResetGame { .. }
            | ClientEvent::Ping {} => Ok(()),
        }
    }
}

fn validate_player_id(id: &PlayerId) -> Result<(), ProtocolError> {
    let len = id.as_str().chars().count();
    if len == 0 {
        return Err(ProtocolError::InvalidMessage("empty player id".into()));
    }
    if len > MAX_PLAYER_ID_LEN {
        return Err(ProtocolError::InvalidMessage(format!(
            "player id longer than {MAX_PLAYER_ID_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_player_name(name: &str) -> Result<(), ProtocolError> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Err(ProtocolError::InvalidMessage("blank player name".into()));
    }
    if len > MAX_PLAYER_NAME_LEN {
        return Err(ProtocolError::InvalidMessage(format!(
            "player name longer than {MAX_PLAYER_NAME_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    RoomCreated { code: RoomCode, player_id: PlayerId },

    #[serde(rename_all = "camelCase")]
    RoomJoined { code: RoomCode, player_id: PlayerId },

    /// Full snapshot for a reconnecting player.
    #[serde(rename_all = "camelCase")]
    StateRestored {
        room_code: RoomCode,
        player_id: PlayerId,
        is_host: bool,
        players: Vec<PlayerView>,
        state: Phase,
        round_data: RoundData,
        my_answers: AnswerSheet,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        voting_state: Option<VotingState>,
    },

    #[serde(rename_all = "camelCase")]
    UpdatePlayers { players: Vec<PlayerView> },

    #[serde(rename_all = "camelCase")]
    RoundStarted {
        round: u32,
        letter: char,
        /// Unix milliseconds.
        end_time: u64,
        categories: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    RoundStopped { stopped_by: PlayerId },

    /// Everyone must submit their sheet now.
    RequestAnswers {},

    #[serde(rename_all = "camelCase")]
    StartVotingPhase {
        target_player: TargetPlayer,
        answers: AnswerSheet,
    },

    #[serde(rename_all = "camelCase")]
    VotingProgress {
        voters: Vec<PlayerId>,
        total_needed: usize,
    },

    /// Result of one settled ballot.
    #[serde(rename_all = "camelCase")]
    PlayerRoundTotal {
        player: TargetPlayer,
        round_score: u32,
        total_score: u32,
        details: Vec<CategoryVerdict>,
    },

    #[serde(rename_all = "camelCase")]
    RoundEnded {
        leaderboard: Vec<PlayerView>,
        is_game_over: bool,
        round_details: Vec<RoundDetail>,
        categories: Vec<String>,
    },

    #[serde(rename_all = "camelCase")]
    GameReset { categories: Vec<String> },

    #[serde(rename_all = "camelCase")]
    Pong { server_time: u64 },

    #[serde(rename_all = "camelCase")]
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl ServerEvent {
    /// Builds an `error` event without a machine-readable code.
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
            code: None,
        }
    }

    /// Builds an `error` event with a machine-readable code.
    pub fn error_with_code(
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        ServerEvent::Error {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::RoomCreated { .. } => "room_created",
            ServerEvent::RoomJoined { .. } => "room_joined",
            ServerEvent::StateRestored { .. } => "state_restored",
            ServerEvent::UpdatePlayers { .. } => "update_players",
            ServerEvent::RoundStarted { .. } => "round_started",
            ServerEvent::RoundStopped { .. } => "round_stopped",
            ServerEvent::RequestAnswers {} => "request_answers",
            ServerEvent::StartVotingPhase { .. } => "start_voting_phase",
            ServerEvent::VotingProgress { .. } => "voting_progress",
            ServerEvent::PlayerRoundTotal { .. } => "player_round_total",
            ServerEvent::RoundEnded { .. } => "round_ended",
            ServerEvent::GameReset { .. } => "game_reset",
            ServerEvent::Pong { .. } => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_join_room_from_wire() {
        let raw = json!({
            "event": "join_room",
            "data": {"code": "K3Z9Q", "playerName": "Ana", "playerId": "a-1"}
        });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                code: RoomCode::new("K3Z9Q"),
                player_name: "Ana".into(),
                player_id: PlayerId::new("a-1"),
            }
        );
    }

    #[test]
    fn test_client_event_submit_votes_from_wire() {
        let raw = json!({
            "event": "submit_votes",
            "data": {
                "code": "K3Z9Q",
                "targetPlayerId": "b",
                "votes": {"Animal": true, "Color": false}
            }
        });
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        let ClientEvent::SubmitVotes {
            target_player_id,
            votes,
            ..
        } = event
        else {
            panic!("expected SubmitVotes, got {event:?}");
        };
        assert_eq!(target_player_id, PlayerId::new("b"));
        assert_eq!(votes.get("Animal"), Some(&true));
        assert_eq!(votes.get("Color"), Some(&false));
    }

    #[test]
    fn test_client_event_ping_with_empty_data() {
        let raw = json!({"event": "ping", "data": {}});
        let event: ClientEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event, ClientEvent::Ping {});
    }

    #[test]
    fn test_client_event_unknown_name_is_rejected() {
        let raw = json!({"event": "delete_everything", "data": {}});
        assert!(serde_json::from_value::<ClientEvent>(raw).is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed_join() {
        let event = ClientEvent::JoinRoom {
            code: RoomCode::new("ABCDE"),
            player_name: "  Ana ".into(),
            player_id: PlayerId::new("a-1"),
        };
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_player_id() {
        let event = ClientEvent::CreateRoom {
            player_name: "Ana".into(),
            player_id: PlayerId::new(""),
        };
        assert!(matches!(
            event.validate(),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_and_long_names() {
        let blank = ClientEvent::CreateRoom {
            player_name: "   ".into(),
            player_id: PlayerId::new("a"),
        };
        assert!(blank.validate().is_err());

        let long = ClientEvent::RejoinRequest {
            player_id: PlayerId::new("a"),
            room_code: RoomCode::new("ABCDE"),
            player_name: "x".repeat(MAX_PLAYER_NAME_LEN + 1),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_server_event_request_answers_shape() {
        let value = serde_json::to_value(ServerEvent::RequestAnswers {}).unwrap();
        assert_eq!(value, json!({"event": "request_answers", "data": {}}));
    }

    #[test]
    fn test_server_event_round_started_shape() {
        let event = ServerEvent::RoundStarted {
            round: 1,
            letter: 'M',
            end_time: 1_000,
            categories: vec!["Animal".into()],
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "round_started",
                "data": {"round": 1, "letter": "M", "endTime": 1000, "categories": ["Animal"]}
            })
        );
    }

    #[test]
    fn test_server_event_error_omits_missing_code() {
        let value = serde_json::to_value(ServerEvent::error("Room not found")).unwrap();
        assert_eq!(
            value,
            json!({"event": "error", "data": {"message": "Room not found"}})
        );

        let value = serde_json::to_value(ServerEvent::error_with_code(
            "Could not rejoin room",
            "REJOIN_FAILED",
        ))
        .unwrap();
        assert_eq!(value["data"]["code"], "REJOIN_FAILED");
    }

    #[test]
    fn test_server_event_state_restored_omits_voting_state_when_absent() {
        let event = ServerEvent::StateRestored {
            room_code: RoomCode::new("AAAAA"),
            player_id: PlayerId::new("a"),
            is_host: true,
            players: vec![],
            state: Phase::Lobby,
            round_data: RoundData {
                round: 0,
                letter: None,
                end_time: 0,
                categories: vec![],
            },
            my_answers: AnswerSheet::new(),
            voting_state: None,
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["data"]["state"], "LOBBY");
        assert_eq!(value["data"]["isHost"], true);
        assert!(value["data"].get("votingState").is_none());
    }

    #[test]
    fn test_server_event_name_matches_tag() {
        let events = [
            ServerEvent::Pong { server_time: 5 },
            ServerEvent::RoundStopped {
                stopped_by: PlayerId::new("a"),
            },
            ServerEvent::GameReset { categories: vec![] },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.name());
        }
    }
}
