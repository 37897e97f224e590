// The single-writer hub. One task owns every user, lobby, challenge, and
// game; everything else in the process communicates with it through the
// event queue. No hub state is ever touched from another task.

use std::collections::HashMap;

use game_core::protocol::{ClientMessage, ServerMessage, UserEntry};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frameworks::db::GameStore;
use crate::use_cases::challenge::Challenge;
use crate::use_cases::game::GameSession;
use crate::use_cases::lobby::Lobby;
use crate::use_cases::types::{HubEvent, Outbound};

pub struct User {
    pub id: Uuid,
    pub name: String,
    pub outbound: mpsc::Sender<Outbound>,
    pub lobby: Option<Uuid>,
    pub game: Option<Uuid>,
    /// Set once the connection claims a bot seat; used by the stale sweep.
    pub is_bot: bool,
}

pub struct HubState {
    pub(crate) hub_tx: mpsc::Sender<HubEvent>,
    pub(crate) users: HashMap<Uuid, User>,
    pub(crate) lobbies: HashMap<Uuid, Lobby>,
    pub(crate) challenges: HashMap<Uuid, Challenge>,
    pub(crate) games: HashMap<Uuid, GameSession>,
    pub(crate) store: Option<GameStore>,
}

/// Runs the hub until the event queue closes. Exactly one of these exists
/// per process.
pub async fn hub_task(
    mut rx: mpsc::Receiver<HubEvent>,
    hub_tx: mpsc::Sender<HubEvent>,
    store: Option<GameStore>,
) {
    let mut hub = HubState::new(hub_tx, store);
    while let Some(event) = rx.recv().await {
        hub.handle_event(event);
    }
    info!("hub queue closed; event loop exiting");
}

impl HubState {
    pub fn new(hub_tx: mpsc::Sender<HubEvent>, store: Option<GameStore>) -> HubState {
        HubState {
            hub_tx,
            users: HashMap::new(),
            lobbies: HashMap::new(),
            challenges: HashMap::new(),
            games: HashMap::new(),
            store,
        }
    }

    pub fn handle_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Register { user_id, outbound } => self.register(user_id, outbound),
            HubEvent::Unregister { user_id } => self.unregister(user_id),
            HubEvent::Message { user_id, msg } => self.dispatch(user_id, msg),
            HubEvent::MoveTimeout {
                game_id,
                player,
                turn,
            } => self.move_timeout(game_id, player, turn),
            HubEvent::ChallengeExpired { challenge_id } => self.challenge_expired(challenge_id),
            HubEvent::CleanupGame { game_id } => self.cleanup_game(game_id),
            HubEvent::SweepStale => self.sweep_stale(),
        }
    }

    fn dispatch(&mut self, user_id: Uuid, msg: ClientMessage) {
        // A message can race its sender's unregister through the queue.
        if !self.users.contains_key(&user_id) {
            debug!(%user_id, "message from unknown user dropped");
            return;
        }
        match msg {
            ClientMessage::Challenge {
                target_user_id,
                rows,
                cols,
            } => self.create_challenge(user_id, target_user_id, rows, cols),
            ClientMessage::AcceptChallenge { challenge_id } => {
                self.accept_challenge(user_id, challenge_id)
            }
            ClientMessage::DeclineChallenge { challenge_id } => {
                self.decline_challenge(user_id, challenge_id)
            }
            ClientMessage::CreateLobby { rows, cols } => self.create_lobby(user_id, rows, cols),
            ClientMessage::JoinLobby {
                lobby_id,
                request_id,
            } => self.join_lobby(user_id, lobby_id, request_id),
            ClientMessage::LeaveLobby => self.leave_lobby(user_id),
            ClientMessage::AddBot { lobby_id, settings } => {
                self.add_bot(user_id, lobby_id, settings)
            }
            ClientMessage::RemoveBot { lobby_id, seat } => {
                self.remove_bot(user_id, lobby_id, seat)
            }
            ClientMessage::StartMultiplayerGame { lobby_id } => {
                self.start_multiplayer_game(user_id, lobby_id)
            }
            ClientMessage::Move { game_id, row, col } => {
                self.play_move(user_id, game_id, row, col)
            }
            ClientMessage::Neutrals { game_id, cells } => {
                self.play_neutrals(user_id, game_id, cells)
            }
            ClientMessage::Resign { game_id } => self.resign(user_id, game_id),
            ClientMessage::Rematch { game_id } => self.rematch(user_id, game_id),
        }
    }

    fn register(&mut self, user_id: Uuid, outbound: mpsc::Sender<Outbound>) {
        let name = guest_name(&user_id);
        self.users.insert(
            user_id,
            User {
                id: user_id,
                name: name.clone(),
                outbound,
                lobby: None,
                game: None,
                is_bot: false,
            },
        );
        info!(%user_id, name = %name, "user registered");
        self.send_to(
            user_id,
            ServerMessage::Welcome {
                user_id,
                username: name,
            },
        );
        self.broadcast_users();
    }

    fn unregister(&mut self, user_id: Uuid) {
        let Some(user) = self.users.remove(&user_id) else {
            return;
        };
        info!(%user_id, name = %user.name, "user unregistered");

        // Dropping the outbound sender ends the writer task.
        drop(user.outbound);

        self.drop_challenges_of(user_id);
        if let Some(lobby_id) = user.lobby {
            self.eject_from_lobby(user_id, lobby_id);
        }
        if let Some(game_id) = user.game {
            self.handle_game_disconnect(user_id, game_id);
        }
        self.broadcast_users();
    }

    /// Non-blocking publish into one client's outbound queue. A full queue
    /// means the consumer cannot keep up; the session is dropped rather than
    /// ever stalling the hub.
    pub(crate) fn send_to(&mut self, user_id: Uuid, msg: ServerMessage) {
        let Some(user) = self.users.get(&user_id) else {
            return;
        };
        match user.outbound.try_send(Outbound::Message(msg)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%user_id, "outbound queue full; dropping client");
                self.post(HubEvent::Unregister { user_id });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.post(HubEvent::Unregister { user_id });
            }
        }
    }

    pub(crate) fn send_error(&mut self, user_id: Uuid, reason: &str) {
        self.send_to(
            user_id,
            ServerMessage::Error {
                message: reason.to_string(),
            },
        );
    }

    pub(crate) fn broadcast(&mut self, msg: ServerMessage) {
        let ids: Vec<Uuid> = self.users.keys().copied().collect();
        for id in ids {
            self.send_to(id, msg.clone());
        }
    }

    pub(crate) fn broadcast_users(&mut self) {
        let users: Vec<UserEntry> = self
            .users
            .values()
            .map(|u| UserEntry {
                user_id: u.id,
                username: u.name.clone(),
                in_game: u.game.is_some(),
                in_lobby: u.lobby.is_some(),
            })
            .collect();
        self.broadcast(ServerMessage::UsersUpdate { users });
    }

    /// Self-post; the event lands behind whatever is already queued.
    pub(crate) fn post(&self, event: HubEvent) {
        if let Err(e) = self.hub_tx.try_send(event) {
            warn!(error = %e, "failed to self-post hub event");
        }
    }
}

fn guest_name(id: &Uuid) -> String {
    let hex = id.simple().to_string();
    format!("guest-{}", &hex[..4])
}
