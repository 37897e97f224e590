// Zobrist keys for (cell index, packed cell byte) pairs plus a side-to-move
// key per player. Hashes update incrementally in Position::apply/undo.

use game_core::board::MAX_PLAYERS;
use game_core::{Board, Cell};
use rand::{Rng, SeedableRng, rngs::StdRng};

// Packed cell bytes top out at 0x30 (Killed), so 64 slots cover every value.
const CELL_VALUES: usize = 64;
const KEY_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

pub struct Zobrist {
    cells: Vec<[u64; CELL_VALUES]>,
    side: [u64; MAX_PLAYERS + 1],
}

impl Zobrist {
    pub fn new(rows: usize, cols: usize) -> Zobrist {
        let mut rng = StdRng::seed_from_u64(KEY_SEED ^ ((rows as u64) << 32) ^ cols as u64);
        let cells = (0..rows * cols)
            .map(|_| {
                let mut keys = [0u64; CELL_VALUES];
                for key in keys.iter_mut() {
                    *key = rng.random();
                }
                keys
            })
            .collect();
        let mut side = [0u64; MAX_PLAYERS + 1];
        for key in side.iter_mut().skip(1) {
            *key = rng.random();
        }
        Zobrist { cells, side }
    }

    pub fn cell_key(&self, idx: usize, cell: Cell) -> u64 {
        self.cells[idx][cell.raw() as usize]
    }

    pub fn side_key(&self, player: u8) -> u64 {
        self.side[player as usize]
    }

    /// Hash computed from scratch; the incremental updates must always agree
    /// with this.
    pub fn full_hash(&self, board: &Board, side: u8) -> u64 {
        let mut hash = self.side_key(side);
        for (r, c, cell) in board.iter() {
            hash ^= self.cell_key(board.index(r, c), cell);
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_core::cell::Cell;

    #[test]
    fn keys_are_stable_and_distinct() {
        let a = Zobrist::new(5, 5);
        let b = Zobrist::new(5, 5);
        assert_eq!(a.cell_key(0, Cell::normal(1)), b.cell_key(0, Cell::normal(1)));
        assert_ne!(a.cell_key(0, Cell::normal(1)), a.cell_key(0, Cell::normal(2)));
        assert_ne!(a.cell_key(0, Cell::normal(1)), a.cell_key(1, Cell::normal(1)));
        assert_ne!(a.side_key(1), a.side_key(2));
    }

    #[test]
    fn side_to_move_perturbs_the_hash() {
        let z = Zobrist::new(5, 5);
        let board = Board::new(5, 5, 2).expect("board");
        assert_ne!(z.full_hash(&board, 1), z.full_hash(&board, 2));
    }
}
