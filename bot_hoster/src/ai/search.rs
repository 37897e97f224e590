// Iterative-deepening minimax with alpha-beta pruning. The searching bot
// maximizes on its own plies and assumes every other player minimizes
// against it; each ply is a single placement with the side advancing to the
// next active player. Move application goes through the shared rules engine
// so search and hub can never disagree on capture or elimination semantics.

use std::time::{Duration, Instant};

use game_core::GameState;
use game_core::cell::{Cell, Flag};
use game_core::protocol::BotSettings;
use game_core::rules::{self, Move};
use rand::Rng;
use tracing::debug;

use super::eval::{DEFEAT_SCORE, EvalWeights, evaluate};
use super::ordering::ordered_moves;
use super::table::{Bound, TransTable, TtEntry};
use super::zobrist::Zobrist;

const INF: i32 = i32::MAX / 2;
const ROOT_CHILD_CAP: usize = 16;
const DEEP_CHILD_CAP: usize = 12;
const MAX_DEPTH: u32 = 32;

/// Search state: a rules-engine `GameState` plus an incrementally maintained
/// Zobrist hash. `state.current` is the side to move.
#[derive(Debug, Clone)]
pub struct Position {
    pub state: GameState,
    pub hash: u64,
}

/// Everything needed to restore a Position to the state before one apply().
pub struct SearchUndo {
    rules: rules::Undo,
    prev_side: u8,
}

impl Position {
    pub fn from_state(state: &GameState, zobrist: &Zobrist) -> Position {
        Position {
            state: state.clone(),
            hash: zobrist.full_hash(&state.board, state.current),
        }
    }

    fn next_active(&self, after: u8) -> u8 {
        let n = self.state.players() as u8;
        let mut p = after;
        for _ in 0..n {
            p = if p >= n { 1 } else { p + 1 };
            if self.state.active[p as usize] {
                return p;
            }
        }
        after
    }

    pub fn apply(&mut self, mv: Move, z: &Zobrist) -> SearchUndo {
        let mover = self.state.current;
        let record = rules::apply(&mut self.state, mover, mv);

        // Hash in the cell changes the rules engine just made.
        let board = &self.state.board;
        match mv {
            Move::Standard { row, col } => {
                let idx = board.index(row, col);
                self.hash ^= z.cell_key(idx, record.prev_a) ^ z.cell_key(idx, board.get(row, col));
            }
            Move::Neutral { a, b } => {
                let ia = board.index(a.0, a.1);
                let ib = board.index(b.0, b.1);
                self.hash ^= z.cell_key(ia, record.prev_a) ^ z.cell_key(ia, Cell::KILLED);
                self.hash ^= z.cell_key(ib, record.prev_b) ^ z.cell_key(ib, Cell::KILLED);
            }
        }

        self.hash ^= z.side_key(mover);
        self.state.current = self.next_active(mover);
        self.hash ^= z.side_key(self.state.current);

        SearchUndo {
            rules: record,
            prev_side: mover,
        }
    }

    pub fn undo(&mut self, undo: SearchUndo, z: &Zobrist) {
        self.hash ^= z.side_key(self.state.current);
        self.state.current = undo.prev_side;
        self.hash ^= z.side_key(self.state.current);

        // Hash out the cell changes before the rules engine reverses them.
        let board = &self.state.board;
        match undo.rules.mv {
            Move::Standard { row, col } => {
                let idx = board.index(row, col);
                self.hash ^=
                    z.cell_key(idx, board.get(row, col)) ^ z.cell_key(idx, undo.rules.prev_a);
            }
            Move::Neutral { a, b } => {
                let ia = board.index(a.0, a.1);
                let ib = board.index(b.0, b.1);
                self.hash ^= z.cell_key(ia, Cell::KILLED) ^ z.cell_key(ia, undo.rules.prev_a);
                self.hash ^= z.cell_key(ib, Cell::KILLED) ^ z.cell_key(ib, undo.rules.prev_b);
            }
        }
        rules::undo(&mut self.state, undo.rules);
    }

    /// A standard move that takes the victim's last territory cell: the
    /// instant-kill case the search never looks past.
    pub fn last_cell_victim(&self, mv: Move) -> Option<u8> {
        let Move::Standard { row, col } = mv else {
            return None;
        };
        let target = self.state.board.get(row, col);
        let victim = target.owner();
        (victim != 0
            && target.flag() == Flag::Normal
            && self.state.board.territory_count(victim) == 1)
            .then_some(victim)
    }
}

pub struct Engine {
    pub weights: EvalWeights,
    pub budget: Duration,
    zobrist: Zobrist,
}

impl Engine {
    /// Builds an engine for one game, jittering the configured weights by
    /// up to ±50% so pooled bots do not mirror each other.
    pub fn new<R: Rng>(rows: usize, cols: usize, settings: &BotSettings, rng: &mut R) -> Engine {
        let base = EvalWeights::from(settings);
        let mut jitter = |w: i32| ((w as f64 * rng.random_range(0.5..1.5)).round() as i32).max(1);
        let weights = EvalWeights {
            material: jitter(base.material),
            mobility: jitter(base.mobility),
            position: jitter(base.position),
            redundancy: jitter(base.redundancy),
            cohesion: jitter(base.cohesion),
        };
        Engine {
            weights,
            budget: Duration::from_millis(settings.budget_ms),
            zobrist: Zobrist::new(rows, cols),
        }
    }

    /// Deterministic construction without weight jitter.
    pub fn with_weights(
        rows: usize,
        cols: usize,
        weights: EvalWeights,
        budget: Duration,
    ) -> Engine {
        Engine {
            weights,
            budget,
            zobrist: Zobrist::new(rows, cols),
        }
    }

    /// Iterative deepening under the wall-clock budget. Always returns a
    /// legal move while one exists, even if the very first depth ran out of
    /// time.
    pub fn choose_move(&self, state: &GameState, me: u8) -> Option<Move> {
        let start = Instant::now();
        let deadline = start + self.budget;
        let mut pos = Position::from_state(state, &self.zobrist);
        let root_active = pos.state.active;
        let table = TransTable::new();

        let mut best = None;
        let mut depth = 1;
        loop {
            let mut ctx = SearchCtx {
                zobrist: &self.zobrist,
                table: &table,
                weights: &self.weights,
                me,
                root_active,
                deadline,
                aborted: false,
                nodes: 0,
            };
            let (score, mv) = ctx.search_root(&mut pos, depth);
            if ctx.aborted {
                // The interrupted depth is discarded; the previous completed
                // depth's move stands.
                break;
            }
            if mv.is_some() {
                best = mv;
            }
            debug!(depth, score, nodes = ctx.nodes, tt = table.len(), "depth complete");
            if score >= DEFEAT_SCORE {
                break;
            }
            depth += 1;
            if depth > MAX_DEPTH || start.elapsed() > self.budget.mul_f64(0.75) {
                break;
            }
        }

        best.or_else(|| ordered_moves(&pos.state, me, 1).into_iter().next())
    }
}

struct SearchCtx<'a> {
    zobrist: &'a Zobrist,
    table: &'a TransTable,
    weights: &'a EvalWeights,
    me: u8,
    root_active: [bool; game_core::board::MAX_PLAYERS + 1],
    deadline: Instant,
    aborted: bool,
    nodes: u64,
}

impl SearchCtx<'_> {
    fn search_root(&mut self, pos: &mut Position, depth: u32) -> (i32, Option<Move>) {
        let side = pos.state.current;
        let mut moves = ordered_moves(&pos.state, side, ROOT_CHILD_CAP);
        // Previous iterations left their best root move in the table.
        promote_tt_move(&mut moves, self.table.get(pos.hash).and_then(|e| e.best));

        let mut best_score = -INF;
        let mut best_move = None;
        let mut alpha = -INF;

        for mv in moves {
            if self.expired() {
                break;
            }
            if pos.last_cell_victim(mv).is_some() {
                return (DEFEAT_SCORE, Some(mv));
            }
            let undo = pos.apply(mv, self.zobrist);
            let score = self.minimax(pos, depth.saturating_sub(1), 1, alpha, INF);
            pos.undo(undo, self.zobrist);
            if self.aborted {
                break;
            }
            if score > best_score {
                best_score = score;
                best_move = Some(mv);
            }
            alpha = alpha.max(best_score);
        }
        (best_score, best_move)
    }

    fn minimax(&mut self, pos: &mut Position, depth: u32, ply: u32, mut alpha: i32, mut beta: i32) -> i32 {
        self.nodes += 1;
        if self.expired() {
            return 0;
        }
        if !pos.state.active[self.me as usize] {
            return -DEFEAT_SCORE + ply as i32;
        }
        if depth == 0 {
            return evaluate(&pos.state, self.me, &self.root_active, self.weights);
        }

        let key = pos.hash;
        let mut tt_move = None;
        if let Some(entry) = self.table.get(key) {
            tt_move = entry.best;
            if entry.depth >= depth {
                match entry.bound {
                    Bound::Exact => return entry.score,
                    Bound::Lower => alpha = alpha.max(entry.score),
                    Bound::Upper => beta = beta.min(entry.score),
                }
                if alpha >= beta {
                    return entry.score;
                }
            }
        }

        let side = pos.state.current;
        let maximizing = side == self.me;
        let cap = if ply <= 1 { ROOT_CHILD_CAP } else { DEEP_CHILD_CAP };
        let mut moves = ordered_moves(&pos.state, side, cap);
        promote_tt_move(&mut moves, tt_move);
        if moves.is_empty() {
            // The side to move is boxed in; score the position as it stands.
            return evaluate(&pos.state, self.me, &self.root_active, self.weights);
        }

        let (orig_alpha, orig_beta) = (alpha, beta);
        let mut value = if maximizing { -INF } else { INF };
        let mut best_mv = None;
        for mv in moves {
            let score = match pos.last_cell_victim(mv) {
                Some(victim) if victim == self.me => -DEFEAT_SCORE + ply as i32,
                Some(_) if maximizing => DEFEAT_SCORE - ply as i32,
                _ => {
                    let undo = pos.apply(mv, self.zobrist);
                    let score = self.minimax(pos, depth - 1, ply + 1, alpha, beta);
                    pos.undo(undo, self.zobrist);
                    score
                }
            };
            if self.aborted {
                return 0;
            }
            if maximizing {
                if score > value {
                    value = score;
                    best_mv = Some(mv);
                }
                alpha = alpha.max(value);
            } else {
                if score < value {
                    value = score;
                    best_mv = Some(mv);
                }
                beta = beta.min(value);
            }
            if alpha >= beta {
                break;
            }
        }

        let bound = if value <= orig_alpha {
            Bound::Upper
        } else if value >= orig_beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.table.insert(
            key,
            TtEntry {
                score: value,
                depth,
                bound,
                best: best_mv,
            },
        );
        value
    }

    fn expired(&mut self) -> bool {
        if !self.aborted && Instant::now() >= self.deadline {
            self.aborted = true;
        }
        self.aborted
    }
}

/// Moves the remembered transposition move to the front, keeping the static
/// ordering for everything behind it.
fn promote_tt_move(moves: &mut [Move], tt_move: Option<Move>) {
    if let Some(best) = tt_move {
        if let Some(idx) = moves.iter().position(|&m| m == best) {
            moves[..=idx].rotate_right(1);
        }
    }
}
