// Rules engine: move legality, connectivity to base, turn lifecycle,
// elimination, and win detection. The hub owns the authoritative GameState;
// bot clients replay the same transitions into a local mirror.

use crate::board::{Board, BoardError, MAX_PLAYERS};
use crate::cell::{Cell, Flag};

/// Standard moves per turn before control advances.
pub const MOVES_PER_TURN: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Standard { row: usize, col: usize },
    Neutral { a: (usize, usize), b: (usize, usize) },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    GameOver,
    NotYourTurn,
    PlayerInactive,
    OutOfBounds,
    TargetBlocked,
    NotConnected,
    NeutralsSpent,
    BadNeutralTarget,
}

impl std::fmt::Display for MoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            MoveError::GameOver => "game is over",
            MoveError::NotYourTurn => "not your turn",
            MoveError::PlayerInactive => "player is eliminated",
            MoveError::OutOfBounds => "target out of bounds",
            MoveError::TargetBlocked => "target cannot be taken",
            MoveError::NotConnected => "no connected friendly neighbor",
            MoveError::NeutralsSpent => "neutral move already used",
            MoveError::BadNeutralTarget => "neutral targets must be two distinct own normal cells",
        };
        f.write_str(reason)
    }
}

/// Result of a standard move, carrying everything the hub needs to announce
/// the effects in order.
#[derive(Debug, Clone)]
pub struct StandardOutcome {
    /// True when the move captured an opponent cell (target became Fortified).
    pub fortified: bool,
    /// Moves remaining in the current turn after this move.
    pub moves_left: u8,
    /// Players knocked out by this action, in the order it happened.
    pub eliminated: Vec<u8>,
    pub turn_ended: bool,
    pub next_player: Option<u8>,
    pub winner: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct NeutralOutcome {
    pub eliminated: Vec<u8>,
    pub next_player: Option<u8>,
    pub winner: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct ResignOutcome {
    /// Stuck players eliminated while advancing past the resigner.
    pub eliminated: Vec<u8>,
    pub next_player: Option<u8>,
    pub winner: Option<u8>,
}

/// Authoritative state of one game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub board: Board,
    /// Player whose turn it is, 1-based seat order.
    pub current: u8,
    pub moves_left: u8,
    pub neutrals_used: [bool; MAX_PLAYERS + 1],
    pub active: [bool; MAX_PLAYERS + 1],
    pub turn: u32,
    pub over: bool,
    pub winner: Option<u8>,
}

impl GameState {
    pub fn new(rows: usize, cols: usize, players: usize) -> Result<GameState, BoardError> {
        let board = Board::new(rows, cols, players)?;
        let mut active = [false; MAX_PLAYERS + 1];
        for p in 1..=players {
            active[p] = true;
        }
        Ok(GameState {
            board,
            current: 1,
            moves_left: MOVES_PER_TURN,
            neutrals_used: [false; MAX_PLAYERS + 1],
            active,
            turn: 1,
            over: false,
            winner: None,
        })
    }

    pub fn players(&self) -> usize {
        self.board.players()
    }

    pub fn active_count(&self) -> usize {
        (1..=self.players()).filter(|&p| self.active[p]).count()
    }

    fn sole_active(&self) -> Option<u8> {
        let mut it = (1..=self.players() as u8).filter(|&p| self.active[p as usize]);
        let first = it.next()?;
        it.next().is_none().then_some(first)
    }

    /// Checks a standard move without applying it.
    pub fn validate_standard(&self, player: u8, row: usize, col: usize) -> Result<(), MoveError> {
        self.check_to_move(player)?;
        if !self.board.in_bounds(row, col) {
            return Err(MoveError::OutOfBounds);
        }
        let target = self.board.get(row, col);
        let capturable =
            target.is_empty() || (target.owner() != player && target.flag() == Flag::Normal);
        if !capturable {
            return Err(MoveError::TargetBlocked);
        }
        let reachable = connected_set(&self.board, player);
        let has_anchor = self
            .board
            .neighbors8(row, col)
            .any(|(r, c)| reachable[self.board.index(r, c)]);
        if !has_anchor {
            return Err(MoveError::NotConnected);
        }
        Ok(())
    }

    /// Applies one standard move for the current player.
    pub fn play_standard(
        &mut self,
        player: u8,
        row: usize,
        col: usize,
    ) -> Result<StandardOutcome, MoveError> {
        self.validate_standard(player, row, col)?;

        let target = self.board.get(row, col);
        let captured_from = (target.owner() != 0).then_some(target.owner());
        let fortified = captured_from.is_some();
        let placed = if fortified {
            Cell::fortified(player)
        } else {
            Cell::normal(player)
        };
        self.board.set(row, col, placed);
        self.moves_left -= 1;

        let mut eliminated = Vec::new();
        if let Some(victim) = captured_from {
            // A player whose last territory cell was taken is out; the base
            // stays on the board but is inert from here on.
            if self.board.territory_count(victim) == 0 {
                self.active[victim as usize] = false;
                eliminated.push(victim);
            }
        }

        if let Some(w) = self.try_finish() {
            return Ok(StandardOutcome {
                fortified,
                moves_left: self.moves_left,
                eliminated,
                turn_ended: true,
                next_player: None,
                winner: Some(w),
            });
        }

        if self.moves_left == 0 {
            let (cascade, next, winner) = self.advance_turn();
            eliminated.extend(cascade);
            return Ok(StandardOutcome {
                fortified,
                moves_left: 0,
                eliminated,
                turn_ended: true,
                next_player: next,
                winner,
            });
        }

        Ok(StandardOutcome {
            fortified,
            moves_left: self.moves_left,
            eliminated,
            turn_ended: false,
            next_player: None,
            winner: None,
        })
    }

    /// Applies the once-per-game neutral move: two own Normal cells become
    /// Killed and the turn ends immediately.
    pub fn play_neutrals(
        &mut self,
        player: u8,
        a: (usize, usize),
        b: (usize, usize),
    ) -> Result<NeutralOutcome, MoveError> {
        self.check_to_move(player)?;
        if self.neutrals_used[player as usize] {
            return Err(MoveError::NeutralsSpent);
        }
        if a == b {
            return Err(MoveError::BadNeutralTarget);
        }
        for (row, col) in [a, b] {
            if !self.board.in_bounds(row, col) {
                return Err(MoveError::OutOfBounds);
            }
            let cell = self.board.get(row, col);
            if cell.owner() != player || cell.flag() != Flag::Normal {
                return Err(MoveError::BadNeutralTarget);
            }
        }

        self.board.set(a.0, a.1, Cell::KILLED);
        self.board.set(b.0, b.1, Cell::KILLED);
        self.neutrals_used[player as usize] = true;

        let (eliminated, next_player, winner) = self.advance_turn();
        Ok(NeutralOutcome {
            eliminated,
            next_player,
            winner,
        })
    }

    /// Marks a player inactive. Used for explicit resigns, move timeouts, and
    /// mid-game disconnects; cells stay on the board.
    pub fn resign(&mut self, player: u8) -> Result<ResignOutcome, MoveError> {
        if self.over {
            return Err(MoveError::GameOver);
        }
        let p = player as usize;
        if p == 0 || p > self.players() || !self.active[p] {
            return Err(MoveError::PlayerInactive);
        }
        let was_current = self.current == player;
        self.active[p] = false;

        if let Some(w) = self.try_finish() {
            return Ok(ResignOutcome {
                eliminated: Vec::new(),
                next_player: None,
                winner: Some(w),
            });
        }

        if was_current {
            let (eliminated, next_player, winner) = self.advance_turn();
            return Ok(ResignOutcome {
                eliminated,
                next_player,
                winner,
            });
        }

        Ok(ResignOutcome {
            eliminated: Vec::new(),
            next_player: Some(self.current),
            winner: None,
        })
    }

    /// True if the player has at least one legal standard move.
    pub fn has_any_standard_move(&self, player: u8) -> bool {
        !standard_targets(&self.board, player).is_empty()
    }

    fn check_to_move(&self, player: u8) -> Result<(), MoveError> {
        if self.over {
            return Err(MoveError::GameOver);
        }
        let p = player as usize;
        if p == 0 || p > self.players() || !self.active[p] {
            return Err(MoveError::PlayerInactive);
        }
        if self.current != player {
            return Err(MoveError::NotYourTurn);
        }
        Ok(())
    }

    /// Ends the game when one active player remains.
    fn try_finish(&mut self) -> Option<u8> {
        let w = self.sole_active()?;
        self.over = true;
        self.winner = Some(w);
        Some(w)
    }

    /// Hands control to the next active seat, eliminating players that can
    /// no longer move until a playable player (or a winner) is found.
    fn advance_turn(&mut self) -> (Vec<u8>, Option<u8>, Option<u8>) {
        let mut eliminated = Vec::new();
        loop {
            let next = self.next_active_after(self.current);
            self.current = next;
            self.moves_left = MOVES_PER_TURN;
            self.turn += 1;

            let p = next as usize;
            let can_place = self.has_any_standard_move(next);
            let can_neutral = !self.neutrals_used[p]
                && normal_cell_count(&self.board, next) >= 2;
            if can_place || can_neutral {
                return (eliminated, Some(next), None);
            }

            self.active[p] = false;
            eliminated.push(next);
            if let Some(w) = self.try_finish() {
                return (eliminated, None, Some(w));
            }
        }
    }

    fn next_active_after(&self, player: u8) -> u8 {
        let n = self.players() as u8;
        let mut p = player;
        loop {
            p = if p >= n { 1 } else { p + 1 };
            if self.active[p as usize] {
                return p;
            }
        }
    }
}

/// Per-cell reachability from the player's base over 8-connected own cells.
/// Indexed by `board.index(row, col)`.
pub fn connected_set(board: &Board, player: u8) -> Vec<bool> {
    let mut seen = vec![false; board.rows() * board.cols()];
    let (br, bc) = board.base_position(player);
    if board.get(br, bc).owner() != player {
        return seen;
    }
    let mut queue = vec![(br, bc)];
    seen[board.index(br, bc)] = true;
    while let Some((r, c)) = queue.pop() {
        for (nr, nc) in board.neighbors8(r, c) {
            let idx = board.index(nr, nc);
            if !seen[idx] && board.get(nr, nc).owner() == player {
                seen[idx] = true;
                queue.push((nr, nc));
            }
        }
    }
    seen
}

/// True if the cell at (row, col) is owned by the player and reachable from
/// their base.
pub fn connected_to_base(board: &Board, player: u8, row: usize, col: usize) -> bool {
    board.get(row, col).owner() == player && connected_set(board, player)[board.index(row, col)]
}

/// Every legal standard-move target for the player: empty or opposing Normal
/// cells with at least one 8-neighbor that is connected to the player's base.
pub fn standard_targets(board: &Board, player: u8) -> Vec<(usize, usize)> {
    let reachable = connected_set(board, player);
    let mut targets = Vec::new();
    for (r, c, cell) in board.iter() {
        let capturable =
            cell.is_empty() || (cell.owner() != player && cell.flag() == Flag::Normal);
        if !capturable {
            continue;
        }
        if board
            .neighbors8(r, c)
            .any(|(nr, nc)| reachable[board.index(nr, nc)])
        {
            targets.push((r, c));
        }
    }
    targets
}

fn normal_cell_count(board: &Board, player: u8) -> usize {
    board
        .iter()
        .filter(|&(_, _, c)| c.owner() == player && c.flag() == Flag::Normal)
        .count()
}

/// Everything needed to reverse one [`apply`] call. A single placement can
/// eliminate at most one player: the owner of the captured cell.
#[derive(Debug, Clone, Copy)]
pub struct Undo {
    pub mv: Move,
    pub player: u8,
    pub prev_a: Cell,
    pub prev_b: Cell,
    pub eliminated: Option<u8>,
}

/// Applies one move for `player` without turn accounting: the placement or
/// neutral sacrifice plus any capture elimination. Used by minimax, which
/// tracks side-to-move and move counts itself; the hub goes through
/// [`GameState::play_standard`] and [`GameState::play_neutrals`] instead,
/// which share this capture/elimination semantics.
pub fn apply(state: &mut GameState, player: u8, mv: Move) -> Undo {
    match mv {
        Move::Standard { row, col } => {
            let prev = state.board.get(row, col);
            let placed = if prev.owner() != 0 {
                Cell::fortified(player)
            } else {
                Cell::normal(player)
            };
            state.board.set(row, col, placed);

            let victim = prev.owner();
            let mut eliminated = None;
            if victim != 0 && state.board.territory_count(victim) == 0 {
                state.active[victim as usize] = false;
                eliminated = Some(victim);
            }
            Undo {
                mv,
                player,
                prev_a: prev,
                prev_b: Cell::EMPTY,
                eliminated,
            }
        }
        Move::Neutral { a, b } => {
            let prev_a = state.board.get(a.0, a.1);
            let prev_b = state.board.get(b.0, b.1);
            state.board.set(a.0, a.1, Cell::KILLED);
            state.board.set(b.0, b.1, Cell::KILLED);
            state.neutrals_used[player as usize] = true;
            Undo {
                mv,
                player,
                prev_a,
                prev_b,
                eliminated: None,
            }
        }
    }
}

/// Restores the state mutated by the matching [`apply`] bit for bit.
pub fn undo(state: &mut GameState, undo: Undo) {
    match undo.mv {
        Move::Standard { row, col } => {
            state.board.set(row, col, undo.prev_a);
            if let Some(victim) = undo.eliminated {
                state.active[victim as usize] = true;
            }
        }
        Move::Neutral { a, b } => {
            state.board.set(a.0, a.1, undo.prev_a);
            state.board.set(b.0, b.1, undo.prev_b);
            state.neutrals_used[undo.player as usize] = false;
        }
    }
}

/// Every candidate move for `player`: all standard targets plus the neutral
/// option while it is still available. Used by minimax.
pub fn legal_moves(state: &GameState, player: u8) -> Vec<Move> {
    let mut moves: Vec<Move> = standard_targets(&state.board, player)
        .into_iter()
        .map(|(row, col)| Move::Standard { row, col })
        .collect();
    if let Some((a, b)) = neutral_option(state, player) {
        moves.push(Move::Neutral { a, b });
    }
    moves
}

/// The neutral line worth considering for a player: their two Normal cells
/// with the most enemy contact, while the once-per-game move is unspent.
/// Cells with no opposing neighbor are never worth sacrificing.
pub fn neutral_option(state: &GameState, player: u8) -> Option<((usize, usize), (usize, usize))> {
    if state.neutrals_used[player as usize] {
        return None;
    }
    let board = &state.board;
    let mut contested: Vec<(usize, (usize, usize))> = Vec::new();
    for (r, c, cell) in board.iter() {
        if cell.owner() != player || cell.flag() != Flag::Normal {
            continue;
        }
        let opposing = board
            .neighbors8(r, c)
            .filter(|&(nr, nc)| {
                let owner = board.get(nr, nc).owner();
                owner != 0 && owner != player
            })
            .count();
        if opposing > 0 {
            contested.push((opposing, (r, c)));
        }
    }
    if contested.len() < 2 {
        return None;
    }
    contested.sort_by_key(|&(opposing, _)| std::cmp::Reverse(opposing));
    Some((contested[0].1, contested[1].1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_turn(state: &mut GameState, moves: [(usize, usize); 3]) {
        for (r, c) in moves {
            let player = state.current;
            state.play_standard(player, r, c).expect("legal move");
        }
    }

    #[test]
    fn opening_moves_grow_from_the_base() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        assert_eq!(state.current, 1);
        let out = state.play_standard(1, 0, 1).expect("adjacent to base");
        assert!(!out.fortified);
        assert_eq!(out.moves_left, 2);
        assert!(!out.turn_ended);
        assert_eq!(state.board.get(0, 1), Cell::normal(1));
    }

    #[test]
    fn legality_requires_a_base_connected_neighbor() {
        // Player 1 owns the base plus (0,1); (2,2) touches nothing of theirs,
        // and (3,3) touches only disconnected ground.
        let mut state = GameState::new(5, 5, 2).expect("state");
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(3, 4, Cell::normal(2));

        assert_eq!(
            state.validate_standard(1, 2, 2),
            Err(MoveError::NotConnected)
        );
        assert!(state.validate_standard(1, 1, 1).is_ok());
        assert_eq!(
            state.validate_standard(1, 3, 3),
            Err(MoveError::NotConnected)
        );
    }

    #[test]
    fn disconnected_own_cells_do_not_anchor_moves() {
        let mut state = GameState::new(7, 7, 2).expect("state");
        // An island of player 1 cells far from the base.
        state.board.set(4, 4, Cell::normal(1));
        assert!(!connected_to_base(&state.board, 1, 4, 4));
        assert_eq!(
            state.validate_standard(1, 4, 5),
            Err(MoveError::NotConnected)
        );
    }

    #[test]
    fn capture_fortifies_and_fortified_is_immune() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        // Build a corridor for player 1 up to player 2 territory.
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(1, 2, Cell::normal(1));
        state.board.set(2, 3, Cell::normal(2));
        state.board.set(3, 4, Cell::normal(2));

        let out = state.play_standard(1, 2, 3).expect("capture");
        assert!(out.fortified);
        assert_eq!(state.board.get(2, 3), Cell::fortified(1));

        // Player 2 cannot take it back.
        state.current = 2;
        state.moves_left = MOVES_PER_TURN;
        assert_eq!(
            state.validate_standard(2, 2, 3),
            Err(MoveError::TargetBlocked)
        );
    }

    #[test]
    fn bases_are_never_capturable() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        // March player 1 next to player 2's base.
        state.board.set(1, 1, Cell::normal(1));
        state.board.set(2, 2, Cell::normal(1));
        state.board.set(3, 3, Cell::normal(1));
        assert_eq!(
            state.validate_standard(1, 4, 4),
            Err(MoveError::TargetBlocked)
        );
    }

    #[test]
    fn third_move_ends_the_turn_and_resets_moves() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        drain_turn(&mut state, [(0, 1), (1, 0), (1, 1)]);
        assert_eq!(state.current, 2);
        assert_eq!(state.moves_left, MOVES_PER_TURN);
        assert_eq!(state.turn, 2);
    }

    #[test]
    fn out_of_turn_and_unknown_player_moves_are_rejected() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        assert_eq!(
            state.play_standard(2, 4, 3).unwrap_err(),
            MoveError::NotYourTurn
        );
        assert_eq!(
            state.play_standard(3, 0, 1).unwrap_err(),
            MoveError::PlayerInactive
        );
    }

    #[test]
    fn neutral_move_kills_two_cells_and_ends_the_turn() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(1, 1, Cell::normal(1));

        let out = state.play_neutrals(1, (0, 1), (1, 1)).expect("neutral");
        assert_eq!(state.board.get(0, 1), Cell::KILLED);
        assert_eq!(state.board.get(1, 1), Cell::KILLED);
        assert!(state.neutrals_used[1]);
        assert_eq!(out.next_player, Some(2));
        assert_eq!(state.moves_left, MOVES_PER_TURN);

        // Second neutral for the same player is refused for the whole game.
        state.current = 1;
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(1, 1, Cell::normal(1));
        assert_eq!(
            state.play_neutrals(1, (0, 1), (1, 1)).unwrap_err(),
            MoveError::NeutralsSpent
        );
    }

    #[test]
    fn neutral_targets_must_be_own_normal_cells() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(1, 1, Cell::fortified(1));

        // Fortified, base, foreign, duplicate, and out-of-bounds targets.
        assert_eq!(
            state.play_neutrals(1, (0, 1), (1, 1)).unwrap_err(),
            MoveError::BadNeutralTarget
        );
        assert_eq!(
            state.play_neutrals(1, (0, 1), (0, 0)).unwrap_err(),
            MoveError::BadNeutralTarget
        );
        assert_eq!(
            state.play_neutrals(1, (0, 1), (0, 1)).unwrap_err(),
            MoveError::BadNeutralTarget
        );
        assert_eq!(
            state.play_neutrals(1, (0, 1), (0, 9)).unwrap_err(),
            MoveError::OutOfBounds
        );
        assert!(!state.neutrals_used[1]);
    }

    #[test]
    fn capturing_the_last_territory_cell_eliminates_and_wins() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        // Player 2 holds a single normal cell next to their base; player 1
        // has a connected path adjacent to it.
        state.board.set(1, 1, Cell::normal(1));
        state.board.set(2, 2, Cell::normal(1));
        state.board.set(3, 3, Cell::normal(2));

        let out = state.play_standard(1, 3, 3).expect("winning capture");
        assert_eq!(out.eliminated, vec![2]);
        assert_eq!(out.winner, Some(1));
        assert!(state.over);
        assert!(!state.active[2]);
    }

    #[test]
    fn zero_territory_flips_active_in_the_same_action() {
        let mut state = GameState::new(5, 5, 3).expect("state");
        state.board.set(1, 1, Cell::normal(1));
        state.board.set(2, 2, Cell::normal(1));
        state.board.set(3, 3, Cell::normal(2));

        let out = state.play_standard(1, 3, 3).expect("capture");
        // Three players: the game continues, but player 2 is out already.
        assert_eq!(out.eliminated, vec![2]);
        assert!(out.winner.is_none());
        assert!(!state.active[2]);
        assert!(!state.over);
    }

    #[test]
    fn turn_advance_skips_eliminated_seats() {
        let mut state = GameState::new(7, 7, 3).expect("state");
        state.active[2] = false;
        drain_turn(&mut state, [(0, 1), (1, 0), (1, 1)]);
        assert_eq!(state.current, 3);
    }

    #[test]
    fn stuck_player_with_spent_neutrals_is_eliminated_on_turn_start() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        // Wall off player 2's base corner completely with fortified cells so
        // no target remains, and mark their neutral as used.
        for (r, c) in [(3, 3), (3, 4), (4, 3)] {
            state.board.set(r, c, Cell::fortified(1));
        }
        state.neutrals_used[2] = true;

        drain_turn(&mut state, [(0, 1), (1, 0), (1, 1)]);
        assert!(!state.active[2]);
        assert!(state.over);
        assert_eq!(state.winner, Some(1));
    }

    #[test]
    fn resign_of_current_player_advances_and_can_end_the_game() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        let out = state.resign(1).expect("resign");
        assert_eq!(out.winner, Some(2));
        assert!(state.over);
        assert_eq!(state.resign(2).unwrap_err(), MoveError::GameOver);
    }

    #[test]
    fn resign_of_waiting_player_keeps_the_turn_in_place() {
        let mut state = GameState::new(5, 5, 3).expect("state");
        let out = state.resign(3).expect("resign");
        assert!(out.winner.is_none());
        assert_eq!(out.next_player, Some(1));
        assert_eq!(state.current, 1);
        assert!(!state.active[3]);
    }

    #[test]
    fn apply_and_undo_are_exact_inverses() {
        let mut state = GameState::new(7, 7, 2).expect("state");
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(1, 1, Cell::normal(1));
        state.board.set(1, 2, Cell::normal(2));
        let reference = state.clone();

        // A capture that eliminates player 2, then a neutral sacrifice.
        for (player, mv) in [
            (1, Move::Standard { row: 1, col: 2 }),
            (1, Move::Neutral { a: (0, 1), b: (1, 1) }),
        ] {
            let record = apply(&mut state, player, mv);
            undo(&mut state, record);
            assert_eq!(state, reference, "state diverged after {mv:?}");
        }

        let first = apply(&mut state, 1, Move::Standard { row: 2, col: 2 });
        let second = apply(&mut state, 2, Move::Standard { row: 4, col: 3 });
        undo(&mut state, second);
        undo(&mut state, first);
        assert_eq!(state, reference);
    }

    #[test]
    fn apply_records_capture_eliminations() {
        let mut state = GameState::new(7, 7, 2).expect("state");
        state.board.set(1, 2, Cell::normal(2));

        let record = apply(&mut state, 1, Move::Standard { row: 1, col: 2 });
        assert_eq!(record.eliminated, Some(2));
        assert!(!state.active[2]);
        assert_eq!(state.board.get(1, 2), Cell::fortified(1));
        undo(&mut state, record);
        assert!(state.active[2]);
    }

    #[test]
    fn legal_moves_offer_the_neutral_only_under_contact() {
        let mut state = GameState::new(7, 7, 2).expect("state");
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(1, 1, Cell::normal(1));
        assert!(
            legal_moves(&state, 1)
                .iter()
                .all(|m| matches!(m, Move::Standard { .. })),
            "uncontested cells are not worth sacrificing"
        );

        // Pressure both cells and the neutral pair appears.
        for (r, c) in [(0, 2), (1, 2), (2, 0), (2, 1)] {
            state.board.set(r, c, Cell::normal(2));
        }
        assert!(
            legal_moves(&state, 1)
                .iter()
                .any(|m| matches!(m, Move::Neutral { .. }))
        );

        state.neutrals_used[1] = true;
        assert!(
            legal_moves(&state, 1)
                .iter()
                .all(|m| matches!(m, Move::Standard { .. }))
        );
    }

    #[test]
    fn moves_after_game_over_are_rejected() {
        let mut state = GameState::new(5, 5, 2).expect("state");
        state.resign(1).expect("resign");
        assert_eq!(state.play_standard(2, 4, 3).unwrap_err(), MoveError::GameOver);
        assert_eq!(
            state.play_neutrals(2, (4, 3), (3, 4)).unwrap_err(),
            MoveError::GameOver
        );
    }
}
