// Direct 1v1 challenges. A challenge lives until it is accepted, declined,
// either party disconnects, or its expiry timer fires.

use std::time::Instant;

use game_core::board::{MAX_DIM, MIN_DIM};
use game_core::protocol::ServerMessage;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::frameworks::config::CHALLENGE_TIMEOUT;
use crate::use_cases::hub::HubState;
use crate::use_cases::types::HubEvent;

pub struct Challenge {
    pub id: Uuid,
    pub from: Uuid,
    pub to: Uuid,
    pub rows: usize,
    pub cols: usize,
    pub created_at: Instant,
    expiry: JoinHandle<()>,
}

impl HubState {
    pub(crate) fn create_challenge(
        &mut self,
        from: Uuid,
        target: Uuid,
        rows: usize,
        cols: usize,
    ) {
        if target == from {
            self.send_error(from, "cannot challenge yourself");
            return;
        }
        if !dimensions_ok(rows, cols) {
            self.send_error(from, "board dimensions out of range");
            return;
        }
        let Some(challenger) = self.users.get(&from) else {
            return;
        };
        if challenger.game.is_some() || challenger.lobby.is_some() {
            self.send_error(from, "leave your game or lobby first");
            return;
        }
        let from_username = challenger.name.clone();
        let Some(target_user) = self.users.get(&target) else {
            self.send_error(from, "player not found");
            return;
        };
        if target_user.game.is_some() || target_user.lobby.is_some() {
            self.send_error(from, "player is busy");
            return;
        }

        let challenge_id = Uuid::new_v4();
        let hub_tx = self.hub_tx.clone();
        let expiry = tokio::spawn(async move {
            tokio::time::sleep(CHALLENGE_TIMEOUT).await;
            let _ = hub_tx.send(HubEvent::ChallengeExpired { challenge_id }).await;
        });
        self.challenges.insert(
            challenge_id,
            Challenge {
                id: challenge_id,
                from,
                to: target,
                rows,
                cols,
                created_at: Instant::now(),
                expiry,
            },
        );
        info!(%challenge_id, %from, %target, rows, cols, "challenge created");
        self.send_to(
            target,
            ServerMessage::ChallengeReceived {
                challenge_id,
                from_user_id: from,
                from_username,
                rows,
                cols,
            },
        );
    }

    pub(crate) fn accept_challenge(&mut self, user_id: Uuid, challenge_id: Uuid) {
        let Some(challenge) = self.challenges.get(&challenge_id) else {
            self.send_error(user_id, "challenge expired");
            return;
        };
        if challenge.to != user_id {
            self.send_error(user_id, "challenge is not addressed to you");
            return;
        }
        let (from, rows, cols) = (challenge.from, challenge.rows, challenge.cols);

        let challenger_free = self
            .users
            .get(&from)
            .is_some_and(|u| u.game.is_none() && u.lobby.is_none());
        if !challenger_free {
            self.remove_challenge(challenge_id);
            self.send_error(user_id, "challenger is no longer available");
            return;
        }
        let Some(acceptor) = self.users.get(&user_id) else {
            return;
        };
        if acceptor.game.is_some() || acceptor.lobby.is_some() {
            self.send_error(user_id, "leave your game or lobby first");
            return;
        }

        self.remove_challenge(challenge_id);
        info!(%challenge_id, "challenge accepted");
        // Challenger takes seat 1, acceptor seat 2.
        self.start_game(vec![from, user_id], rows, cols, false);
    }

    pub(crate) fn decline_challenge(&mut self, user_id: Uuid, challenge_id: Uuid) {
        let Some(challenge) = self.challenges.get(&challenge_id) else {
            return;
        };
        if challenge.to != user_id {
            self.send_error(user_id, "challenge is not addressed to you");
            return;
        }
        let from = challenge.from;
        self.remove_challenge(challenge_id);
        info!(%challenge_id, "challenge declined");
        self.send_to(from, ServerMessage::ChallengeDeclined { challenge_id });
    }

    /// Expiry timer fired: auto-decline toward the challenger.
    pub(crate) fn challenge_expired(&mut self, challenge_id: Uuid) {
        let Some(challenge) = self.challenges.remove(&challenge_id) else {
            return;
        };
        debug!(
            %challenge_id,
            age_secs = challenge.created_at.elapsed().as_secs(),
            "challenge expired"
        );
        self.send_to(
            challenge.from,
            ServerMessage::ChallengeDeclined { challenge_id },
        );
    }

    /// Disconnect cascade: every challenge touching the user dies, and the
    /// surviving party learns about it.
    pub(crate) fn drop_challenges_of(&mut self, user_id: Uuid) {
        let ids: Vec<Uuid> = self
            .challenges
            .values()
            .filter(|c| c.from == user_id || c.to == user_id)
            .map(|c| c.id)
            .collect();
        for challenge_id in ids {
            if let Some(challenge) = self.remove_challenge(challenge_id) {
                let other = if challenge.from == user_id {
                    challenge.to
                } else {
                    challenge.from
                };
                self.send_to(other, ServerMessage::ChallengeDeclined { challenge_id });
            }
        }
    }

    fn remove_challenge(&mut self, challenge_id: Uuid) -> Option<Challenge> {
        let challenge = self.challenges.remove(&challenge_id)?;
        challenge.expiry.abort();
        Some(challenge)
    }
}

pub(crate) fn dimensions_ok(rows: usize, cols: usize) -> bool {
    (MIN_DIM..=MAX_DIM).contains(&rows) && (MIN_DIM..=MAX_DIM).contains(&cols)
}
