//! Wire protocol: JSON over WebSocket, one message per frame, tagged by a
//! `type` string. Shared by the hub, the bot hoster, and the tests so the
//! two processes can never drift apart.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A board coordinate as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

/// Tunable parameters for one bot seat. The first five are evaluation
/// weights; the hoster jitters them per game so bots do not play identically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotSettings {
    pub material: i32,
    pub mobility: i32,
    pub position: i32,
    pub redundancy: i32,
    pub cohesion: i32,
    pub budget_ms: u64,
}

impl Default for BotSettings {
    fn default() -> Self {
        BotSettings {
            material: 30,
            mobility: 150,
            position: 130,
            redundancy: 40,
            cohesion: 40,
            budget_ms: 670,
        }
    }
}

/// Messages a client (human or bot) may send to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Challenge {
        target_user_id: Uuid,
        rows: usize,
        cols: usize,
    },
    AcceptChallenge {
        challenge_id: Uuid,
    },
    DeclineChallenge {
        challenge_id: Uuid,
    },
    CreateLobby {
        rows: usize,
        cols: usize,
    },
    JoinLobby {
        lobby_id: Uuid,
        /// Present when a bot claims a seat announced via `bot_wanted`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<Uuid>,
    },
    LeaveLobby,
    AddBot {
        lobby_id: Uuid,
        #[serde(default)]
        settings: BotSettings,
    },
    RemoveBot {
        lobby_id: Uuid,
        seat: usize,
    },
    StartMultiplayerGame {
        lobby_id: Uuid,
    },
    Move {
        game_id: Uuid,
        row: usize,
        col: usize,
    },
    Neutrals {
        game_id: Uuid,
        cells: [CellRef; 2],
    },
    Resign {
        game_id: Uuid,
    },
    Rematch {
        game_id: Uuid,
    },
}

/// Messages the hub sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        user_id: Uuid,
        username: String,
    },
    UsersUpdate {
        users: Vec<UserEntry>,
    },
    ChallengeReceived {
        challenge_id: Uuid,
        from_user_id: Uuid,
        from_username: String,
        rows: usize,
        cols: usize,
    },
    ChallengeDeclined {
        challenge_id: Uuid,
    },
    LobbyJoined {
        lobby: LobbySnapshot,
    },
    LobbyClosed {
        lobby_id: Uuid,
    },
    /// Broadcast to every connection; an idle bot answers with `join_lobby`.
    BotWanted {
        lobby_id: Uuid,
        settings: BotSettings,
        request_id: Uuid,
    },
    GameStart(GameStart),
    MultiplayerGameStart(GameStart),
    MoveMade {
        game_id: Uuid,
        player: u8,
        row: usize,
        col: usize,
        moves_left: u8,
    },
    NeutralsPlaced {
        game_id: Uuid,
        player: u8,
        cells: [CellRef; 2],
    },
    TurnChange {
        game_id: Uuid,
        player: u8,
    },
    PlayerEliminated {
        game_id: Uuid,
        player: u8,
    },
    OpponentDisconnected {
        game_id: Uuid,
        user_id: Uuid,
    },
    GameEnd {
        game_id: Uuid,
        winner: Option<u8>,
    },
    RematchReceived {
        game_id: Uuid,
        from_user_id: Uuid,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    pub user_id: Uuid,
    pub username: String,
    pub in_game: bool,
    pub in_lobby: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbySnapshot {
    pub lobby_id: Uuid,
    pub host_id: Uuid,
    pub rows: usize,
    pub cols: usize,
    pub seats: Vec<SeatSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SeatSnapshot {
    Empty,
    Human { user_id: Uuid, username: String },
    BotPending { request_id: Uuid },
    Bot { user_id: Uuid, username: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStart {
    pub game_id: Uuid,
    pub rows: usize,
    pub cols: usize,
    /// Seat index of the receiving client, 1-based.
    pub your_player: u8,
    pub players: Vec<PlayerDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDescriptor {
    pub player: u8,
    pub username: String,
    pub is_bot: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip_client(msg: ClientMessage) {
        let encoded = serde_json::to_string(&msg).expect("encode");
        let decoded: ClientMessage = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, msg);
        let re_encoded = serde_json::to_string(&decoded).expect("re-encode");
        assert_eq!(re_encoded, encoded);
    }

    fn round_trip_server(msg: ServerMessage) {
        let encoded = serde_json::to_string(&msg).expect("encode");
        let decoded: ServerMessage = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, msg);
        let re_encoded = serde_json::to_string(&decoded).expect("re-encode");
        assert_eq!(re_encoded, encoded);
    }

    #[test]
    fn client_messages_round_trip() {
        let id = Uuid::new_v4();
        for msg in [
            ClientMessage::Challenge {
                target_user_id: id,
                rows: 10,
                cols: 12,
            },
            ClientMessage::AcceptChallenge { challenge_id: id },
            ClientMessage::DeclineChallenge { challenge_id: id },
            ClientMessage::CreateLobby { rows: 9, cols: 9 },
            ClientMessage::JoinLobby {
                lobby_id: id,
                request_id: None,
            },
            ClientMessage::JoinLobby {
                lobby_id: id,
                request_id: Some(Uuid::new_v4()),
            },
            ClientMessage::LeaveLobby,
            ClientMessage::AddBot {
                lobby_id: id,
                settings: BotSettings::default(),
            },
            ClientMessage::RemoveBot { lobby_id: id, seat: 2 },
            ClientMessage::StartMultiplayerGame { lobby_id: id },
            ClientMessage::Move {
                game_id: id,
                row: 3,
                col: 4,
            },
            ClientMessage::Neutrals {
                game_id: id,
                cells: [CellRef { row: 1, col: 1 }, CellRef { row: 2, col: 2 }],
            },
            ClientMessage::Resign { game_id: id },
            ClientMessage::Rematch { game_id: id },
        ] {
            round_trip_client(msg);
        }
    }

    #[test]
    fn server_messages_round_trip() {
        let id = Uuid::new_v4();
        let start = GameStart {
            game_id: id,
            rows: 8,
            cols: 8,
            your_player: 2,
            players: vec![
                PlayerDescriptor {
                    player: 1,
                    username: "guest-1a2b".into(),
                    is_bot: false,
                },
                PlayerDescriptor {
                    player: 2,
                    username: "guest-3c4d".into(),
                    is_bot: true,
                },
            ],
        };
        for msg in [
            ServerMessage::Welcome {
                user_id: id,
                username: "guest-1a2b".into(),
            },
            ServerMessage::UsersUpdate {
                users: vec![UserEntry {
                    user_id: id,
                    username: "guest-1a2b".into(),
                    in_game: true,
                    in_lobby: false,
                }],
            },
            ServerMessage::ChallengeReceived {
                challenge_id: id,
                from_user_id: id,
                from_username: "guest-1a2b".into(),
                rows: 5,
                cols: 5,
            },
            ServerMessage::ChallengeDeclined { challenge_id: id },
            ServerMessage::LobbyJoined {
                lobby: LobbySnapshot {
                    lobby_id: id,
                    host_id: id,
                    rows: 10,
                    cols: 10,
                    seats: vec![
                        SeatSnapshot::Human {
                            user_id: id,
                            username: "guest-1a2b".into(),
                        },
                        SeatSnapshot::BotPending {
                            request_id: Uuid::new_v4(),
                        },
                        SeatSnapshot::Bot {
                            user_id: id,
                            username: "guest-3c4d".into(),
                        },
                        SeatSnapshot::Empty,
                    ],
                },
            },
            ServerMessage::LobbyClosed { lobby_id: id },
            ServerMessage::BotWanted {
                lobby_id: id,
                settings: BotSettings::default(),
                request_id: id,
            },
            ServerMessage::GameStart(start.clone()),
            ServerMessage::MultiplayerGameStart(start),
            ServerMessage::MoveMade {
                game_id: id,
                player: 1,
                row: 0,
                col: 1,
                moves_left: 2,
            },
            ServerMessage::NeutralsPlaced {
                game_id: id,
                player: 1,
                cells: [CellRef { row: 1, col: 1 }, CellRef { row: 2, col: 2 }],
            },
            ServerMessage::TurnChange {
                game_id: id,
                player: 2,
            },
            ServerMessage::PlayerEliminated {
                game_id: id,
                player: 2,
            },
            ServerMessage::OpponentDisconnected {
                game_id: id,
                user_id: id,
            },
            ServerMessage::GameEnd {
                game_id: id,
                winner: Some(1),
            },
            ServerMessage::GameEnd {
                game_id: id,
                winner: None,
            },
            ServerMessage::RematchReceived {
                game_id: id,
                from_user_id: id,
            },
            ServerMessage::Error {
                message: "not your turn".into(),
            },
        ] {
            round_trip_server(msg);
        }
    }

    #[test]
    fn wire_shape_uses_snake_case_tags_and_camel_case_fields() {
        let id = Uuid::nil();
        let msg = ClientMessage::Move {
            game_id: id,
            row: 3,
            col: 4,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).expect("encode");
        assert_eq!(json["type"], "move");
        assert_eq!(json["gameId"], id.to_string());
        assert_eq!(json["row"], 3);

        let msg = ServerMessage::MoveMade {
            game_id: id,
            player: 1,
            row: 0,
            col: 1,
            moves_left: 2,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).expect("encode");
        assert_eq!(json["type"], "move_made");
        assert_eq!(json["movesLeft"], 2);
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let err = serde_json::from_str::<ClientMessage>(r#"{"type":"teleport"}"#);
        assert!(err.is_err());
    }
}
