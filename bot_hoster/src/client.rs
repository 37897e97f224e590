// One bot connection: Disconnected -> Idle -> InLobby -> InGame -> Idle,
// with a fixed backoff back to Disconnected on any failure. The bot speaks
// the same wire protocol as a human client and mirrors its game locally by
// replaying the hub's broadcasts through the shared rules engine.

use std::sync::Arc;

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite};
use tracing::{debug, info, warn};
use uuid::Uuid;

use game_core::GameState;
use game_core::protocol::{BotSettings, CellRef, ClientMessage, ServerMessage};
use game_core::rules::Move;

use crate::ai::Engine;
use crate::config::RECONNECT_BACKOFF;
use crate::pool::{PHASE_DISCONNECTED, PHASE_IDLE, PHASE_IN_GAME, PHASE_IN_LOBBY, PoolStats};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, tungstenite::Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Debug)]
enum BotError {
    Connect(tungstenite::Error),
    Ws(tungstenite::Error),
    Serialization(serde_json::Error),
    SearchTask(tokio::task::JoinError),
}

enum Phase {
    Idle,
    InLobby {
        lobby_id: Uuid,
        settings: BotSettings,
    },
    InGame(Box<ActiveGame>),
}

struct ActiveGame {
    game_id: Uuid,
    me: u8,
    state: GameState,
    engine: Arc<Engine>,
    /// (turn, moves_left) of the last decision point already answered, so a
    /// move_made echo followed by a turn_change never double-computes.
    last_decision: Option<(u32, u8)>,
}

/// Runs one bot forever: connect, serve, back off, reconnect.
pub async fn bot_task(bot: usize, url: String, stats: Arc<PoolStats>) {
    loop {
        stats.set(bot, PHASE_DISCONNECTED);
        match run_connection(bot, &url, &stats).await {
            Ok(()) => info!(bot, "server closed the connection"),
            Err(e) => warn!(bot, error = ?e, "bot connection failed"),
        }
        stats.set(bot, PHASE_DISCONNECTED);
        tokio::time::sleep(RECONNECT_BACKOFF).await;
    }
}

async fn run_connection(bot: usize, url: &str, stats: &PoolStats) -> Result<(), BotError> {
    let (socket, _) = connect_async(url).await.map_err(BotError::Connect)?;
    let (mut sink, mut stream) = socket.split();
    stats.set(bot, PHASE_IDLE);
    debug!(bot, "connected to hub");

    let mut phase = Phase::Idle;
    serve(bot, &mut sink, &mut stream, &mut phase, stats).await
}

async fn serve(
    bot: usize,
    sink: &mut WsSink,
    stream: &mut WsStream,
    phase: &mut Phase,
    stats: &PoolStats,
) -> Result<(), BotError> {
    while let Some(frame) = stream.next().await {
        match frame.map_err(BotError::Ws)? {
            tungstenite::Message::Text(text) => {
                let Ok(msg) = serde_json::from_str::<ServerMessage>(&text) else {
                    continue;
                };
                handle_message(bot, msg, phase, sink, stats).await?;
            }
            tungstenite::Message::Ping(payload) => {
                sink.send(tungstenite::Message::Pong(payload))
                    .await
                    .map_err(BotError::Ws)?;
            }
            tungstenite::Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

async fn handle_message(
    bot: usize,
    msg: ServerMessage,
    phase: &mut Phase,
    sink: &mut WsSink,
    stats: &PoolStats,
) -> Result<(), BotError> {
    match msg {
        ServerMessage::Welcome { user_id, username } => {
            debug!(bot, %user_id, %username, "identity assigned");
        }
        ServerMessage::BotWanted {
            lobby_id,
            settings,
            request_id,
        } => {
            if matches!(phase, Phase::Idle) {
                send(sink, &ClientMessage::JoinLobby {
                    lobby_id,
                    request_id: Some(request_id),
                })
                .await?;
                *phase = Phase::InLobby { lobby_id, settings };
                stats.set(bot, PHASE_IN_LOBBY);
                info!(bot, %lobby_id, "claiming bot seat");
            }
        }
        ServerMessage::Error { message } => {
            // The only request a bot makes outside a game is the seat claim;
            // a rejection means another bot won the race.
            if matches!(phase, Phase::InLobby { .. }) {
                debug!(bot, %message, "seat claim rejected");
                *phase = Phase::Idle;
                stats.set(bot, PHASE_IDLE);
            } else {
                debug!(bot, %message, "server reported an error");
            }
        }
        ServerMessage::LobbyClosed { lobby_id } => {
            let ours = matches!(&*phase, Phase::InLobby { lobby_id: l, .. } if *l == lobby_id);
            if ours {
                info!(bot, %lobby_id, "lobby closed; back to idle");
                *phase = Phase::Idle;
                stats.set(bot, PHASE_IDLE);
            }
        }
        ServerMessage::GameStart(start) | ServerMessage::MultiplayerGameStart(start) => {
            let settings = match &*phase {
                Phase::InLobby { settings, .. } => *settings,
                _ => BotSettings::default(),
            };
            match GameState::new(start.rows, start.cols, start.players.len()) {
                Ok(state) => {
                    let engine =
                        Arc::new(Engine::new(start.rows, start.cols, &settings, &mut rand::rng()));
                    let mut game = Box::new(ActiveGame {
                        game_id: start.game_id,
                        me: start.your_player,
                        state,
                        engine,
                        last_decision: None,
                    });
                    info!(bot, game_id = %start.game_id, player = start.your_player, "entering game");
                    stats.set(bot, PHASE_IN_GAME);
                    maybe_move(bot, &mut game, sink).await?;
                    *phase = Phase::InGame(game);
                }
                Err(e) => {
                    warn!(bot, error = %e, "unplayable game announcement");
                    *phase = Phase::Idle;
                    stats.set(bot, PHASE_IDLE);
                }
            }
        }
        ServerMessage::MoveMade {
            game_id,
            player,
            row,
            col,
            ..
        } => {
            if let Phase::InGame(game) = phase {
                if game.game_id == game_id {
                    if let Err(e) = game.state.play_standard(player, row, col) {
                        warn!(bot, error = %e, "mirror rejected broadcast move");
                    }
                    maybe_move(bot, game, sink).await?;
                }
            }
        }
        ServerMessage::NeutralsPlaced {
            game_id,
            player,
            cells,
        } => {
            if let Phase::InGame(game) = phase {
                if game.game_id == game_id {
                    let a = (cells[0].row, cells[0].col);
                    let b = (cells[1].row, cells[1].col);
                    if let Err(e) = game.state.play_neutrals(player, a, b) {
                        warn!(bot, error = %e, "mirror rejected broadcast neutrals");
                    }
                    maybe_move(bot, game, sink).await?;
                }
            }
        }
        ServerMessage::PlayerEliminated { game_id, player } => {
            if let Phase::InGame(game) = phase {
                // Captures and stuck-player cascades were already replayed by
                // the move that caused them; this syncs resigns, timeouts,
                // and disconnects.
                if game.game_id == game_id && game.state.active[player as usize] {
                    let _ = game.state.resign(player);
                    maybe_move(bot, game, sink).await?;
                }
            }
        }
        ServerMessage::TurnChange { game_id, .. } => {
            if let Phase::InGame(game) = phase {
                if game.game_id == game_id {
                    maybe_move(bot, game, sink).await?;
                }
            }
        }
        ServerMessage::GameEnd { game_id, .. } => {
            let ours = matches!(&*phase, Phase::InGame(g) if g.game_id == game_id);
            if ours {
                info!(bot, %game_id, "game over; back to idle");
                *phase = Phase::Idle;
                stats.set(bot, PHASE_IDLE);
            }
        }
        // Lobby snapshots, user lists, rematch offers, and 1v1 traffic are
        // irrelevant to a pooled bot.
        _ => {}
    }
    Ok(())
}

/// Computes and sends a move if the mirror says it is this bot's turn and
/// this decision point has not been answered yet. The search runs on a
/// blocking worker so the socket task never stalls.
async fn maybe_move(bot: usize, game: &mut ActiveGame, sink: &mut WsSink) -> Result<(), BotError> {
    if game.state.over || game.state.current != game.me {
        return Ok(());
    }
    let decision = (game.state.turn, game.state.moves_left);
    if game.last_decision == Some(decision) {
        return Ok(());
    }
    game.last_decision = Some(decision);

    let snapshot = game.state.clone();
    let engine = game.engine.clone();
    let me = game.me;
    let chosen = tokio::task::spawn_blocking(move || engine.choose_move(&snapshot, me))
        .await
        .map_err(BotError::SearchTask)?;

    let msg = match chosen {
        Some(Move::Standard { row, col }) => ClientMessage::Move {
            game_id: game.game_id,
            row,
            col,
        },
        Some(Move::Neutral { a, b }) => ClientMessage::Neutrals {
            game_id: game.game_id,
            cells: [
                CellRef { row: a.0, col: a.1 },
                CellRef { row: b.0, col: b.1 },
            ],
        },
        None => {
            debug!(bot, "no playable move left; resigning");
            ClientMessage::Resign {
                game_id: game.game_id,
            }
        }
    };
    send(sink, &msg).await
}

async fn send(sink: &mut WsSink, msg: &ClientMessage) -> Result<(), BotError> {
    let text = serde_json::to_string(msg).map_err(BotError::Serialization)?;
    sink.send(tungstenite::Message::Text(text))
        .await
        .map_err(BotError::Ws)
}
