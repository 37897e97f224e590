// Running games: move application, turn timers, elimination broadcasts,
// cleanup, and the best-effort persistence of finished games.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use game_core::GameState;
use game_core::protocol::{CellRef, GameStart, PlayerDescriptor, ServerMessage};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frameworks::config::{GAME_CLEANUP_DELAY, MOVE_DEADLINE};
use crate::frameworks::db::FinishedGame;
use crate::use_cases::hub::HubState;
use crate::use_cases::types::HubEvent;

#[derive(Debug, Clone)]
pub struct SeatInfo {
    pub user_id: Uuid,
    pub name: String,
    pub is_bot: bool,
    pub connected: bool,
}

/// One recorded turn for the persisted game transcript.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    turn: u32,
    player: u8,
    moves: Vec<MoveRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveRecord {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    col: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cells: Option<[CellRef; 2]>,
    duration_cs: u64,
}

pub struct GameSession {
    pub id: Uuid,
    /// Seat order fixes player indices: seats[0] is player 1.
    pub seats: Vec<SeatInfo>,
    pub state: GameState,
    pub started_at: SystemTime,
    history: Vec<TurnRecord>,
    current_moves: Vec<MoveRecord>,
    recorded_turn: u32,
    recorded_player: u8,
    last_action: Instant,
    move_timer: Option<JoinHandle<()>>,
    cleanup_timer: Option<JoinHandle<()>>,
}

impl GameSession {
    fn new(id: Uuid, seats: Vec<SeatInfo>, state: GameState) -> GameSession {
        GameSession {
            id,
            seats,
            recorded_turn: state.turn,
            recorded_player: state.current,
            state,
            started_at: SystemTime::now(),
            history: Vec::new(),
            current_moves: Vec::new(),
            last_action: Instant::now(),
            move_timer: None,
            cleanup_timer: None,
        }
    }

    pub fn player_of(&self, user_id: Uuid) -> Option<u8> {
        self.seats
            .iter()
            .position(|s| s.user_id == user_id)
            .map(|i| i as u8 + 1)
    }

    pub fn has_connected_human(&self) -> bool {
        self.seats.iter().any(|s| s.connected && !s.is_bot)
    }

    fn record_standard(&mut self, row: usize, col: usize) {
        let duration_cs = (self.last_action.elapsed().as_millis() / 10) as u64;
        self.last_action = Instant::now();
        self.current_moves.push(MoveRecord {
            kind: "move",
            row: Some(row),
            col: Some(col),
            cells: None,
            duration_cs,
        });
    }

    fn record_neutral(&mut self, cells: [CellRef; 2]) {
        let duration_cs = (self.last_action.elapsed().as_millis() / 10) as u64;
        self.last_action = Instant::now();
        self.current_moves.push(MoveRecord {
            kind: "neutrals",
            row: None,
            col: None,
            cells: Some(cells),
            duration_cs,
        });
    }

    /// Flushes the moves of the finished turn into the transcript and
    /// re-baselines on whatever turn the state is in now.
    fn close_turn(&mut self) {
        if !self.current_moves.is_empty() {
            self.history.push(TurnRecord {
                turn: self.recorded_turn,
                player: self.recorded_player,
                moves: std::mem::take(&mut self.current_moves),
            });
        }
        self.recorded_turn = self.state.turn;
        self.recorded_player = self.state.current;
        self.last_action = Instant::now();
    }

    fn finished_row(&self, winner: Option<u8>, termination: &str) -> FinishedGame {
        let mut player_names: [Option<String>; 4] = Default::default();
        for (i, seat) in self.seats.iter().take(4).enumerate() {
            player_names[i] = Some(seat.name.clone());
        }
        let pgn_content = serde_json::to_string(&self.history).unwrap_or_else(|e| {
            warn!(game_id = %self.id, error = %e, "failed to encode transcript");
            "[]".to_string()
        });
        FinishedGame {
            id: self.id,
            started_at: unix_seconds(self.started_at),
            ended_at: unix_seconds(SystemTime::now()),
            rows: self.state.board.rows() as i64,
            cols: self.state.board.cols() as i64,
            player_names,
            result: winner.unwrap_or(0) as i64,
            termination: termination.to_string(),
            pgn_content,
        }
    }

    fn abort_timers(&mut self) {
        if let Some(t) = self.move_timer.take() {
            t.abort();
        }
        if let Some(t) = self.cleanup_timer.take() {
            t.abort();
        }
    }
}

fn unix_seconds(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// (Re)arms the 120 s move deadline for whichever turn the state is in.
fn arm_move_timer(session: &mut GameSession, hub_tx: mpsc::Sender<HubEvent>) {
    if let Some(t) = session.move_timer.take() {
        t.abort();
    }
    let game_id = session.id;
    let player = session.state.current;
    let turn = session.state.turn;
    session.move_timer = Some(tokio::spawn(async move {
        tokio::time::sleep(MOVE_DEADLINE).await;
        let _ = hub_tx
            .send(HubEvent::MoveTimeout {
                game_id,
                player,
                turn,
            })
            .await;
    }));
}

impl HubState {
    /// Materializes a game from a challenge accept or a lobby start. Seat
    /// order follows the participant order handed in.
    pub(crate) fn start_game(
        &mut self,
        participants: Vec<Uuid>,
        rows: usize,
        cols: usize,
        multiplayer: bool,
    ) {
        let state = match GameState::new(rows, cols, participants.len()) {
            Ok(state) => state,
            Err(e) => {
                if let Some(&first) = participants.first() {
                    self.send_error(first, &e.to_string());
                }
                return;
            }
        };

        let game_id = Uuid::new_v4();
        let seats: Vec<SeatInfo> = participants
            .iter()
            .map(|id| {
                let user = &self.users[id];
                SeatInfo {
                    user_id: *id,
                    name: user.name.clone(),
                    is_bot: user.is_bot,
                    connected: true,
                }
            })
            .collect();
        for id in &participants {
            if let Some(user) = self.users.get_mut(id) {
                user.game = Some(game_id);
                user.lobby = None;
            }
        }

        let players: Vec<PlayerDescriptor> = seats
            .iter()
            .enumerate()
            .map(|(i, seat)| PlayerDescriptor {
                player: i as u8 + 1,
                username: seat.name.clone(),
                is_bot: seat.is_bot,
            })
            .collect();

        let mut session = GameSession::new(game_id, seats, state);
        arm_move_timer(&mut session, self.hub_tx.clone());
        self.games.insert(game_id, session);
        info!(%game_id, players = participants.len(), rows, cols, multiplayer, "game started");

        for (i, id) in participants.iter().enumerate() {
            let start = GameStart {
                game_id,
                rows,
                cols,
                your_player: i as u8 + 1,
                players: players.clone(),
            };
            let msg = if multiplayer {
                ServerMessage::MultiplayerGameStart(start)
            } else {
                ServerMessage::GameStart(start)
            };
            self.send_to(*id, msg);
        }
        self.broadcast_users();
    }

    pub(crate) fn play_move(&mut self, user_id: Uuid, game_id: Uuid, row: usize, col: usize) {
        let hub_tx = self.hub_tx.clone();
        let Some(session) = self.games.get_mut(&game_id) else {
            self.send_error(user_id, "game not found");
            return;
        };
        let Some(player) = session.player_of(user_id) else {
            self.send_error(user_id, "not a participant");
            return;
        };

        let outcome = match session.state.play_standard(player, row, col) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.send_error(user_id, &e.to_string());
                return;
            }
        };
        session.record_standard(row, col);

        let mut msgs = vec![ServerMessage::MoveMade {
            game_id,
            player,
            row,
            col,
            moves_left: outcome.moves_left,
        }];
        for &p in &outcome.eliminated {
            msgs.push(ServerMessage::PlayerEliminated { game_id, player: p });
        }

        if outcome.turn_ended {
            session.close_turn();
        }
        if let Some(winner) = outcome.winner {
            self.finish_game(game_id, Some(winner), "elimination", msgs);
            return;
        }
        if let Some(next) = outcome.next_player {
            msgs.push(ServerMessage::TurnChange {
                game_id,
                player: next,
            });
            arm_move_timer(session, hub_tx);
        }
        self.broadcast_game(game_id, msgs);
    }

    pub(crate) fn play_neutrals(&mut self, user_id: Uuid, game_id: Uuid, cells: [CellRef; 2]) {
        let hub_tx = self.hub_tx.clone();
        let Some(session) = self.games.get_mut(&game_id) else {
            self.send_error(user_id, "game not found");
            return;
        };
        let Some(player) = session.player_of(user_id) else {
            self.send_error(user_id, "not a participant");
            return;
        };

        let a = (cells[0].row, cells[0].col);
        let b = (cells[1].row, cells[1].col);
        let outcome = match session.state.play_neutrals(player, a, b) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.send_error(user_id, &e.to_string());
                return;
            }
        };
        session.record_neutral(cells);
        session.close_turn();

        let mut msgs = vec![ServerMessage::NeutralsPlaced {
            game_id,
            player,
            cells,
        }];
        for &p in &outcome.eliminated {
            msgs.push(ServerMessage::PlayerEliminated { game_id, player: p });
        }

        if let Some(winner) = outcome.winner {
            self.finish_game(game_id, Some(winner), "elimination", msgs);
            return;
        }
        if let Some(next) = outcome.next_player {
            msgs.push(ServerMessage::TurnChange {
                game_id,
                player: next,
            });
            arm_move_timer(session, hub_tx);
        }
        self.broadcast_game(game_id, msgs);
    }

    pub(crate) fn resign(&mut self, user_id: Uuid, game_id: Uuid) {
        let Some(session) = self.games.get(&game_id) else {
            self.send_error(user_id, "game not found");
            return;
        };
        let Some(player) = session.player_of(user_id) else {
            self.send_error(user_id, "not a participant");
            return;
        };
        self.force_resign(game_id, player, "resign", Vec::new());
    }

    /// Move deadline fired. The turn counter guards against a timer that
    /// lost the race against a real move in the queue.
    pub(crate) fn move_timeout(&mut self, game_id: Uuid, player: u8, turn: u32) {
        let Some(session) = self.games.get(&game_id) else {
            return;
        };
        if session.state.over || session.state.current != player || session.state.turn != turn {
            debug!(%game_id, player, turn, "stale move timeout ignored");
            return;
        }
        info!(%game_id, player, "move deadline expired; treating as resign");
        self.force_resign(game_id, player, "timeout", Vec::new());
    }

    /// Shared resign path for explicit resigns, timeouts, and disconnects.
    fn force_resign(
        &mut self,
        game_id: Uuid,
        player: u8,
        termination: &str,
        lead_msgs: Vec<ServerMessage>,
    ) {
        let hub_tx = self.hub_tx.clone();
        let Some(session) = self.games.get_mut(&game_id) else {
            return;
        };
        let was_current = session.state.current == player;
        let outcome = match session.state.resign(player) {
            Ok(outcome) => outcome,
            Err(_) => {
                // Already inactive or game over; nothing left to do beyond
                // whatever the caller wanted announced.
                self.broadcast_game(game_id, lead_msgs);
                return;
            }
        };
        session.close_turn();

        let mut msgs = lead_msgs;
        msgs.push(ServerMessage::PlayerEliminated { game_id, player });
        for &p in &outcome.eliminated {
            msgs.push(ServerMessage::PlayerEliminated { game_id, player: p });
        }

        if let Some(winner) = outcome.winner {
            self.finish_game(game_id, Some(winner), termination, msgs);
            return;
        }
        if was_current {
            if let Some(next) = outcome.next_player {
                msgs.push(ServerMessage::TurnChange {
                    game_id,
                    player: next,
                });
                arm_move_timer(session, hub_tx);
            }
        }
        self.broadcast_game(game_id, msgs);
    }

    /// Disconnect cascade from unregister.
    pub(crate) fn handle_game_disconnect(&mut self, user_id: Uuid, game_id: Uuid) {
        let Some(session) = self.games.get_mut(&game_id) else {
            return;
        };
        let Some(player) = session.player_of(user_id) else {
            return;
        };
        session.seats[player as usize - 1].connected = false;
        if session.state.over {
            return;
        }
        info!(%game_id, %user_id, player, "participant disconnected mid-game");
        let lead = vec![ServerMessage::OpponentDisconnected { game_id, user_id }];
        self.force_resign(game_id, player, "disconnect", lead);
    }

    pub(crate) fn rematch(&mut self, user_id: Uuid, game_id: Uuid) {
        let Some(session) = self.games.get(&game_id) else {
            self.send_error(user_id, "game not found");
            return;
        };
        if session.player_of(user_id).is_none() {
            self.send_error(user_id, "not a participant");
            return;
        }
        let others: Vec<Uuid> = session
            .seats
            .iter()
            .filter(|s| s.user_id != user_id && s.connected)
            .map(|s| s.user_id)
            .collect();
        for id in others {
            self.send_to(
                id,
                ServerMessage::RematchReceived {
                    game_id,
                    from_user_id: user_id,
                },
            );
        }
    }

    /// Ends the game: cancels the move timer, announces `game_end`, frees the
    /// participants, queues the delayed cleanup, and hands the transcript to
    /// the store.
    fn finish_game(
        &mut self,
        game_id: Uuid,
        winner: Option<u8>,
        termination: &str,
        mut msgs: Vec<ServerMessage>,
    ) {
        let hub_tx = self.hub_tx.clone();
        let row;
        let seat_ids: Vec<Uuid>;
        {
            let Some(session) = self.games.get_mut(&game_id) else {
                return;
            };
            if let Some(t) = session.move_timer.take() {
                t.abort();
            }
            session.close_turn();
            row = session.finished_row(winner, termination);
            seat_ids = session.seats.iter().map(|s| s.user_id).collect();
            if session.cleanup_timer.is_none() {
                session.cleanup_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(GAME_CLEANUP_DELAY).await;
                    let _ = hub_tx.send(HubEvent::CleanupGame { game_id }).await;
                }));
            }
        }

        for id in &seat_ids {
            if let Some(user) = self.users.get_mut(id) {
                if user.game == Some(game_id) {
                    user.game = None;
                }
            }
        }

        msgs.push(ServerMessage::GameEnd { game_id, winner });
        info!(%game_id, ?winner, termination, "game ended");
        self.broadcast_game(game_id, msgs);

        if let Some(store) = &self.store {
            store.record(row);
        }
        self.broadcast_users();
    }

    /// Delayed removal after `game_end`.
    pub(crate) fn cleanup_game(&mut self, game_id: Uuid) {
        let Some(mut session) = self.games.remove(&game_id) else {
            return;
        };
        session.abort_timers();
        for seat in &session.seats {
            if let Some(user) = self.users.get_mut(&seat.user_id) {
                if user.game == Some(game_id) {
                    user.game = None;
                }
            }
        }
        debug!(%game_id, "game removed");
    }

    /// Periodic sweep: drops games that are over or have no connected humans
    /// left (bot-only games run unattended otherwise).
    pub(crate) fn sweep_stale(&mut self) {
        let stale: Vec<(Uuid, bool)> = self
            .games
            .iter()
            .filter(|(_, s)| s.state.over || !s.has_connected_human())
            .map(|(id, s)| (*id, s.state.over))
            .collect();
        for (game_id, was_over) in stale {
            info!(%game_id, was_over, "sweeping stale game");
            if !was_over {
                if let Some(session) = self.games.get_mut(&game_id) {
                    session.state.over = true;
                }
                self.broadcast_game(
                    game_id,
                    vec![ServerMessage::GameEnd {
                        game_id,
                        winner: None,
                    }],
                );
            }
            self.cleanup_game(game_id);
        }
    }

    pub(crate) fn broadcast_game(&mut self, game_id: Uuid, msgs: Vec<ServerMessage>) {
        let Some(session) = self.games.get(&game_id) else {
            return;
        };
        let recipients: Vec<Uuid> = session
            .seats
            .iter()
            .filter(|s| s.connected)
            .map(|s| s.user_id)
            .collect();
        for msg in msgs {
            for &id in &recipients {
                self.send_to(id, msg.clone());
            }
        }
    }
}
