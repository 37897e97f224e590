// Use-case level inputs/outputs for the hub loop.

use game_core::protocol::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Frames destined for one client's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(ServerMessage),
    Ping,
}

/// Everything the hub loop consumes. Client traffic and self-posted timer
/// events travel through the same queue, so state is only ever touched from
/// one task.
#[derive(Debug)]
pub enum HubEvent {
    Register {
        user_id: Uuid,
        outbound: mpsc::Sender<Outbound>,
    },
    Unregister {
        user_id: Uuid,
    },
    Message {
        user_id: Uuid,
        msg: ClientMessage,
    },
    /// A turn exceeded the move deadline; carries the turn counter so a
    /// timer that lost the race against a real move is ignored.
    MoveTimeout {
        game_id: Uuid,
        player: u8,
        turn: u32,
    },
    ChallengeExpired {
        challenge_id: Uuid,
    },
    /// Fires a fixed delay after `game_end` to drop the finished session.
    CleanupGame {
        game_id: Uuid,
    },
    SweepStale,
}
