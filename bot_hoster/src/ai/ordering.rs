// Cheap static move ordering over the rules engine's candidate list.
// Neighbor terms deliberately count orthogonal neighbors only, while
// legality stays 8-connected.

use game_core::GameState;
use game_core::cell::Flag;
use game_core::rules::{Move, legal_moves};

use super::manhattan;

struct OrderingCtx {
    early: bool,
    center: (usize, usize),
    own_base: (usize, usize),
    opp_bases: Vec<(usize, usize)>,
    span: i32,
}

/// Scores every legal candidate for `player`, best first, truncated to `cap`.
pub fn ordered_moves(state: &GameState, player: u8, cap: usize) -> Vec<Move> {
    let board = &state.board;
    let occupied = board.iter().filter(|&(_, _, c)| !c.is_empty()).count();
    let ctx = OrderingCtx {
        early: occupied * 8 < board.rows() * board.cols(),
        center: (board.rows() / 2, board.cols() / 2),
        own_base: board.base_position(player),
        opp_bases: (1..=board.players() as u8)
            .filter(|&p| p != player && state.active[p as usize])
            .map(|p| board.base_position(p))
            .collect(),
        span: (board.rows() + board.cols()) as i32,
    };

    let mut scored: Vec<(i32, Move)> = legal_moves(state, player)
        .into_iter()
        .map(|mv| {
            let score = match mv {
                Move::Standard { row, col } => score_standard(state, player, row, col, &ctx),
                Move::Neutral { a, b } => score_neutral(state, player, a, b, &ctx),
            };
            (score, mv)
        })
        .collect();

    scored.sort_by_key(|&(score, _)| std::cmp::Reverse(score));
    scored.truncate(cap);
    scored.into_iter().map(|(_, mv)| mv).collect()
}

fn score_standard(
    state: &GameState,
    player: u8,
    row: usize,
    col: usize,
    ctx: &OrderingCtx,
) -> i32 {
    let board = &state.board;
    let target = board.get(row, col);
    let mut score = 0;

    if !target.is_empty() {
        score += 1500;
        let victim = target.owner();
        if board.territory_count(victim) <= 3 {
            score += 2000;
        }
        if ctx
            .opp_bases
            .iter()
            .any(|&base| manhattan((row, col), base) <= 3)
        {
            score += 500;
        }
    }

    let mut empty_neighbors = 0;
    for (nr, nc) in board.neighbors4(row, col) {
        let neighbor = board.get(nr, nc);
        if neighbor.owner() == player {
            score += 80;
            if neighbor.flag() == Flag::Fortified {
                score += 40;
            }
        } else if neighbor.owner() != 0 {
            score += 60;
        } else if neighbor.is_empty() {
            score += 15;
            empty_neighbors += 1;
        }
    }

    if let Some(d) = ctx
        .opp_bases
        .iter()
        .map(|&base| manhattan((row, col), base))
        .min()
    {
        score += ctx.span - d as i32;
    }

    let own_distance = manhattan((row, col), ctx.own_base) as i32;
    if own_distance > 10 {
        score -= 20 * (own_distance - 10);
    }

    if target.is_empty() && empty_neighbors >= 2 {
        score += 100;
    }

    if ctx.early {
        let center_distance = manhattan((row, col), ctx.center) as i32;
        score += (ctx.span / 2 - center_distance).max(0);
    }

    score
}

/// The neutral sacrifice starts deep underwater so it only outranks real
/// moves under heavy pressure, and becomes critical next to the own base.
fn score_neutral(
    state: &GameState,
    player: u8,
    a: (usize, usize),
    b: (usize, usize),
    ctx: &OrderingCtx,
) -> i32 {
    -1500 + cell_threat(state, player, a, ctx.own_base) + cell_threat(state, player, b, ctx.own_base)
}

fn cell_threat(
    state: &GameState,
    player: u8,
    cell: (usize, usize),
    own_base: (usize, usize),
) -> i32 {
    let board = &state.board;
    let opposing = board
        .neighbors8(cell.0, cell.1)
        .filter(|&(nr, nc)| {
            let owner = board.get(nr, nc).owner();
            owner != 0 && owner != player
        })
        .count() as i32;
    let mut threat = 400 * opposing;
    if manhattan(cell, own_base) <= 4 {
        threat += 600;
    }
    threat
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_core::cell::Cell;

    #[test]
    fn captures_outrank_quiet_growth() {
        let mut state = GameState::new(7, 7, 2).expect("state");
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(1, 2, Cell::normal(2));

        let moves = ordered_moves(&state, 1, 16);
        assert!(!moves.is_empty());
        assert_eq!(moves[0], Move::Standard { row: 1, col: 2 });
    }

    #[test]
    fn capping_keeps_the_best_candidates() {
        let state = GameState::new(9, 9, 2).expect("state");
        let all = ordered_moves(&state, 1, 64);
        let capped = ordered_moves(&state, 1, 3);
        assert_eq!(capped.len(), 3);
        assert_eq!(&all[..3], &capped[..]);
    }

    #[test]
    fn quiet_positions_never_offer_neutrals() {
        let mut state = GameState::new(7, 7, 2).expect("state");
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(1, 1, Cell::normal(1));
        let moves = ordered_moves(&state, 1, 64);
        assert!(
            moves.iter().all(|m| matches!(m, Move::Standard { .. })),
            "no opponent contact, so no neutral candidate"
        );
    }

    #[test]
    fn besieged_cells_rank_a_neutral_candidate() {
        let mut state = GameState::new(7, 7, 2).expect("state");
        // Two own normal cells near the base, both pressed by opponents.
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(1, 0, Cell::normal(1));
        for (r, c) in [(0, 2), (1, 2), (2, 2), (2, 0), (2, 1)] {
            state.board.set(r, c, Cell::normal(2));
        }
        let moves = ordered_moves(&state, 1, 64);
        assert!(moves.iter().any(|m| matches!(m, Move::Neutral { .. })));
    }
}
