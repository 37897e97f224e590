// Multiplayer lobbies: up to four ordered seats, host-controlled bot seats,
// and the hand-off into a running game.

use game_core::protocol::{BotSettings, LobbySnapshot, SeatSnapshot, ServerMessage};
use tracing::info;
use uuid::Uuid;

use crate::use_cases::challenge::dimensions_ok;
use crate::use_cases::hub::HubState;

pub const LOBBY_SEATS: usize = 4;

#[derive(Debug, Clone)]
pub enum Seat {
    Empty,
    Human(Uuid),
    /// Announced via `bot_wanted`; an idle bot claims it with the request id.
    BotPending {
        settings: BotSettings,
        request_id: Uuid,
    },
    Bot(Uuid),
}

impl Seat {
    fn occupant(&self) -> Option<Uuid> {
        match self {
            Seat::Human(id) | Seat::Bot(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyStatus {
    Waiting,
    Starting,
}

pub struct Lobby {
    pub id: Uuid,
    pub host: Uuid,
    pub rows: usize,
    pub cols: usize,
    pub seats: [Seat; LOBBY_SEATS],
    pub status: LobbyStatus,
}

impl Lobby {
    fn new(id: Uuid, host: Uuid, rows: usize, cols: usize) -> Lobby {
        let mut lobby = Lobby {
            id,
            host,
            rows,
            cols,
            seats: [const { Seat::Empty }; LOBBY_SEATS],
            status: LobbyStatus::Waiting,
        };
        lobby.seats[0] = Seat::Human(host);
        lobby
    }

    fn members(&self) -> Vec<Uuid> {
        self.seats.iter().filter_map(Seat::occupant).collect()
    }

    fn first_empty(&self) -> Option<usize> {
        self.seats.iter().position(|s| matches!(s, Seat::Empty))
    }

    fn clear_seat_of(&mut self, user_id: Uuid) {
        for seat in &mut self.seats {
            if seat.occupant() == Some(user_id) {
                *seat = Seat::Empty;
            }
        }
    }
}

impl HubState {
    pub(crate) fn create_lobby(&mut self, user_id: Uuid, rows: usize, cols: usize) {
        if !dimensions_ok(rows, cols) {
            self.send_error(user_id, "board dimensions out of range");
            return;
        }
        let Some(user) = self.users.get_mut(&user_id) else {
            return;
        };
        if user.game.is_some() || user.lobby.is_some() {
            self.send_error(user_id, "leave your game or lobby first");
            return;
        }

        let lobby_id = Uuid::new_v4();
        user.lobby = Some(lobby_id);
        self.lobbies
            .insert(lobby_id, Lobby::new(lobby_id, user_id, rows, cols));
        info!(%lobby_id, host = %user_id, rows, cols, "lobby created");
        self.broadcast_lobby(lobby_id);
        self.broadcast_users();
    }

    pub(crate) fn join_lobby(&mut self, user_id: Uuid, lobby_id: Uuid, request_id: Option<Uuid>) {
        let Some(user) = self.users.get(&user_id) else {
            return;
        };
        if user.game.is_some() || user.lobby.is_some() {
            self.send_error(user_id, "leave your game or lobby first");
            return;
        }
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            self.send_error(user_id, "lobby not found");
            return;
        };
        if lobby.status != LobbyStatus::Waiting {
            self.send_error(user_id, "lobby is starting");
            return;
        }

        let claimed_bot_seat = match request_id {
            // Bots answer a bot_wanted broadcast and must name the request.
            Some(request_id) => {
                let seat = lobby.seats.iter().position(
                    |s| matches!(s, Seat::BotPending { request_id: r, .. } if *r == request_id),
                );
                match seat {
                    Some(idx) => {
                        lobby.seats[idx] = Seat::Bot(user_id);
                        true
                    }
                    None => {
                        self.send_error(user_id, "seat already claimed");
                        return;
                    }
                }
            }
            None => match lobby.first_empty() {
                Some(idx) => {
                    lobby.seats[idx] = Seat::Human(user_id);
                    false
                }
                None => {
                    self.send_error(user_id, "lobby is full");
                    return;
                }
            },
        };

        if let Some(user) = self.users.get_mut(&user_id) {
            user.lobby = Some(lobby_id);
            if claimed_bot_seat {
                user.is_bot = true;
            }
        }
        info!(%lobby_id, %user_id, bot = claimed_bot_seat, "joined lobby");
        self.broadcast_lobby(lobby_id);
        self.broadcast_users();
    }

    pub(crate) fn leave_lobby(&mut self, user_id: Uuid) {
        let Some(lobby_id) = self.users.get(&user_id).and_then(|u| u.lobby) else {
            return;
        };
        self.eject_from_lobby(user_id, lobby_id);
        self.broadcast_users();
    }

    /// Removes a user from a lobby; a departing host closes the whole lobby.
    /// Used both for explicit leaves and the disconnect cascade.
    pub(crate) fn eject_from_lobby(&mut self, user_id: Uuid, lobby_id: Uuid) {
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            return;
        };

        if lobby.host == user_id {
            let members = lobby.members();
            self.lobbies.remove(&lobby_id);
            info!(%lobby_id, "lobby closed by host");
            for member in members {
                if let Some(u) = self.users.get_mut(&member) {
                    u.lobby = None;
                }
                self.send_to(member, ServerMessage::LobbyClosed { lobby_id });
            }
            return;
        }

        lobby.clear_seat_of(user_id);
        if let Some(u) = self.users.get_mut(&user_id) {
            u.lobby = None;
        }
        self.send_to(user_id, ServerMessage::LobbyClosed { lobby_id });
        self.broadcast_lobby(lobby_id);
    }

    pub(crate) fn add_bot(&mut self, user_id: Uuid, lobby_id: Uuid, settings: BotSettings) {
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            self.send_error(user_id, "lobby not found");
            return;
        };
        if lobby.host != user_id {
            self.send_error(user_id, "only the host can add bots");
            return;
        }
        let Some(idx) = lobby.first_empty() else {
            self.send_error(user_id, "lobby is full");
            return;
        };

        let request_id = Uuid::new_v4();
        lobby.seats[idx] = Seat::BotPending {
            settings,
            request_id,
        };
        info!(%lobby_id, seat = idx, %request_id, "bot seat announced");
        // Every connection hears this; the hoster's idle bots race to claim.
        self.broadcast(ServerMessage::BotWanted {
            lobby_id,
            settings,
            request_id,
        });
        self.broadcast_lobby(lobby_id);
    }

    pub(crate) fn remove_bot(&mut self, user_id: Uuid, lobby_id: Uuid, seat: usize) {
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            self.send_error(user_id, "lobby not found");
            return;
        };
        if lobby.host != user_id {
            self.send_error(user_id, "only the host can remove bots");
            return;
        }
        if seat >= LOBBY_SEATS {
            self.send_error(user_id, "no such seat");
            return;
        }

        match lobby.seats[seat].clone() {
            Seat::BotPending { .. } => {
                lobby.seats[seat] = Seat::Empty;
                self.broadcast_lobby(lobby_id);
            }
            Seat::Bot(bot_id) => {
                lobby.seats[seat] = Seat::Empty;
                if let Some(u) = self.users.get_mut(&bot_id) {
                    u.lobby = None;
                }
                self.send_to(bot_id, ServerMessage::LobbyClosed { lobby_id });
                self.broadcast_lobby(lobby_id);
                self.broadcast_users();
            }
            _ => self.send_error(user_id, "seat is not a bot"),
        }
    }

    pub(crate) fn start_multiplayer_game(&mut self, user_id: Uuid, lobby_id: Uuid) {
        let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
            self.send_error(user_id, "lobby not found");
            return;
        };
        if lobby.host != user_id {
            self.send_error(user_id, "only the host can start the game");
            return;
        }
        // Pending bot seats have not been claimed and do not count.
        let participants = lobby.members();
        if participants.len() < 2 {
            self.send_error(user_id, "need at least two players");
            return;
        }

        lobby.status = LobbyStatus::Starting;
        let (rows, cols) = (lobby.rows, lobby.cols);
        self.lobbies.remove(&lobby_id);
        for id in &participants {
            if let Some(u) = self.users.get_mut(id) {
                u.lobby = None;
            }
        }
        info!(%lobby_id, players = participants.len(), "lobby starting game");
        self.start_game(participants, rows, cols, true);
    }

    /// Re-sends the lobby snapshot to every member after any seat change.
    fn broadcast_lobby(&mut self, lobby_id: Uuid) {
        let Some(lobby) = self.lobbies.get(&lobby_id) else {
            return;
        };
        let seats = lobby
            .seats
            .iter()
            .map(|seat| match seat {
                Seat::Empty => SeatSnapshot::Empty,
                Seat::Human(id) => SeatSnapshot::Human {
                    user_id: *id,
                    username: self.username_of(*id),
                },
                Seat::BotPending { request_id, .. } => SeatSnapshot::BotPending {
                    request_id: *request_id,
                },
                Seat::Bot(id) => SeatSnapshot::Bot {
                    user_id: *id,
                    username: self.username_of(*id),
                },
            })
            .collect();
        let snapshot = LobbySnapshot {
            lobby_id,
            host_id: lobby.host,
            rows: lobby.rows,
            cols: lobby.cols,
            seats,
        };
        let members = lobby.members();
        for member in members {
            self.send_to(member, ServerMessage::LobbyJoined {
                lobby: snapshot.clone(),
            });
        }
    }

    fn username_of(&self, user_id: Uuid) -> String {
        self.users
            .get(&user_id)
            .map(|u| u.name.clone())
            .unwrap_or_default()
    }
}
