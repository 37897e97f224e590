// Positional evaluator: a weighted sum of terms computed in one board pass,
// always scored from the searching bot's perspective.

use game_core::GameState;
use game_core::board::MAX_PLAYERS;
use game_core::cell::Flag;
use game_core::protocol::BotSettings;

use super::manhattan;

/// Score for a move that wipes out an opponent outright.
pub const DEFEAT_SCORE: i32 = 1_000_000;
/// Awarded per opponent eliminated inside the search tree.
pub const ELIMINATION_BONUS: i32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalWeights {
    pub material: i32,
    pub mobility: i32,
    pub position: i32,
    pub redundancy: i32,
    pub cohesion: i32,
}

impl Default for EvalWeights {
    fn default() -> Self {
        EvalWeights {
            material: 30,
            mobility: 150,
            position: 130,
            redundancy: 40,
            cohesion: 40,
        }
    }
}

impl From<&BotSettings> for EvalWeights {
    fn from(settings: &BotSettings) -> Self {
        EvalWeights {
            material: settings.material,
            mobility: settings.mobility,
            position: settings.position,
            redundancy: settings.redundancy,
            cohesion: settings.cohesion,
        }
    }
}

pub fn evaluate(
    state: &GameState,
    me: u8,
    root_active: &[bool; MAX_PLAYERS + 1],
    w: &EvalWeights,
) -> i32 {
    let board = &state.board;
    let players = board.players() as u8;

    // Any opponent knocked out along this line dominates everything else.
    let mut kills = 0;
    for p in 1..=players {
        if p != me && root_active[p as usize] && !state.active[p as usize] {
            kills += 1;
        }
    }
    if kills > 0 {
        return ELIMINATION_BONUS * kills;
    }
    if !state.active[me as usize] {
        return -ELIMINATION_BONUS;
    }

    let span = (board.rows() + board.cols()) as i32;
    let my_base = board.base_position(me);
    let opp_bases: Vec<(usize, usize)> = (1..=players)
        .filter(|&p| p != me && state.active[p as usize])
        .map(|p| board.base_position(p))
        .collect();

    let mut material = 0i32;
    let mut mobility = 0i32;
    let mut position = 0i32;
    let mut redundancy = 0i32;
    let mut cohesion = 0i32;
    let mut base_danger = 0i32;
    let mut territory = [0i32; MAX_PLAYERS + 1];

    for (r, c, cell) in board.iter() {
        let owner = cell.owner();

        if cell.is_empty() {
            // Gaps: empty squares enclosed by one player's cells.
            let mut per_owner = [0u8; MAX_PLAYERS + 1];
            for (nr, nc) in board.neighbors8(r, c) {
                let n = board.get(nr, nc).owner();
                per_owner[n as usize] += 1;
            }
            if per_owner[me as usize] >= 2 {
                cohesion -= 1;
            }
            for p in 1..=players {
                if p != me && per_owner[p as usize] >= 2 {
                    cohesion += 1;
                }
            }
            continue;
        }
        if owner == 0 {
            // Killed ground belongs to nobody and scores nothing.
            continue;
        }

        if cell.is_territory_of(owner) {
            territory[owner as usize] += 1;
        }

        let sign = if owner == me { 1 } else { -1 };

        material += sign * if cell.flag() == Flag::Fortified { 30 } else { 10 };

        let mut same_neighbors = 0;
        let mut opposing_neighbors = 0;
        for (nr, nc) in board.neighbors8(r, c) {
            let n = board.get(nr, nc).owner();
            if n == 0 {
                continue;
            }
            if n == owner {
                same_neighbors += 1;
            } else {
                opposing_neighbors += 1;
            }
        }
        if opposing_neighbors > 0 {
            mobility += sign;
        }
        if same_neighbors >= 2 {
            redundancy += sign;
        }

        if owner == me {
            if let Some(d) = opp_bases.iter().map(|&b| manhattan((r, c), b)).min() {
                position += span - d as i32;
            }
        } else {
            let d = manhattan((r, c), my_base) as i32;
            position -= span - d;
            if d < 4 {
                base_danger -= (4 - d) * 500;
            }
        }
    }

    let mut vulnerable = 0i32;
    for p in 1..=players {
        if p != me && state.active[p as usize] && (1..=5).contains(&territory[p as usize]) {
            vulnerable += (6 - territory[p as usize]) * 1000;
        }
    }

    // The positional term also folds in five times the raw mobility edge.
    let position = position + 5 * mobility;

    material * w.material
        + mobility * w.mobility
        + position * w.position
        + redundancy * w.redundancy
        + cohesion * w.cohesion
        + base_danger
        + vulnerable
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_core::cell::Cell;

    #[test]
    fn more_territory_scores_higher() {
        let mut state = GameState::new(7, 7, 2).expect("state");
        let baseline = evaluate(&state, 1, &state.active, &EvalWeights::default());
        state.board.set(0, 1, Cell::normal(1));
        state.board.set(1, 1, Cell::normal(1));
        let grown = evaluate(&state, 1, &state.active, &EvalWeights::default());
        assert!(grown > baseline);
    }

    #[test]
    fn symmetry_means_near_zero_start() {
        let state = GameState::new(9, 9, 2).expect("state");
        let p1 = evaluate(&state, 1, &state.active, &EvalWeights::default());
        let p2 = evaluate(&state, 2, &state.active, &EvalWeights::default());
        assert_eq!(p1, p2, "mirrored corners should score alike");
    }

    #[test]
    fn eliminated_opponent_dominates_all_terms() {
        let mut state = GameState::new(7, 7, 2).expect("state");
        let root_active = state.active;
        state.active[2] = false;
        let score = evaluate(&state, 1, &root_active, &EvalWeights::default());
        assert_eq!(score, ELIMINATION_BONUS);
    }

    #[test]
    fn cells_crowding_our_base_are_penalized() {
        let mut state = GameState::new(9, 9, 2).expect("state");
        state.board.set(1, 1, Cell::normal(2));
        let near = evaluate(&state, 1, &state.active, &EvalWeights::default());
        let mut far_state = GameState::new(9, 9, 2).expect("state");
        far_state.board.set(4, 4, Cell::normal(2));
        let far = evaluate(&far_state, 1, &far_state.active, &EvalWeights::default());
        assert!(near < far, "opponent at our doorstep must look worse");
    }
}
