// Rectangular board with one immutable base per player, fixed at a corner.

use crate::cell::{Cell, Flag};

pub const MIN_DIM: usize = 5;
pub const MAX_DIM: usize = 50;
pub const MAX_PLAYERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    BadDimensions { rows: usize, cols: usize },
    BadPlayerCount(usize),
}

impl std::fmt::Display for BoardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoardError::BadDimensions { rows, cols } => {
                write!(f, "board dimensions {rows}x{cols} out of range")
            }
            BoardError::BadPlayerCount(n) => write!(f, "unsupported player count {n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    players: usize,
    cells: Vec<Cell>,
}

impl Board {
    /// Creates an empty board with `players` bases placed at their corners.
    pub fn new(rows: usize, cols: usize, players: usize) -> Result<Board, BoardError> {
        if !(MIN_DIM..=MAX_DIM).contains(&rows) || !(MIN_DIM..=MAX_DIM).contains(&cols) {
            return Err(BoardError::BadDimensions { rows, cols });
        }
        if !(2..=MAX_PLAYERS).contains(&players) {
            return Err(BoardError::BadPlayerCount(players));
        }
        let mut board = Board {
            rows,
            cols,
            players,
            cells: vec![Cell::EMPTY; rows * cols],
        };
        for p in 1..=players as u8 {
            let (r, c) = board.base_position(p);
            board.cells[r * cols + c] = Cell::base(p);
        }
        Ok(board)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn players(&self) -> usize {
        self.players
    }

    /// Corner assignment: p1 top-left, p2 bottom-right, p3 top-right,
    /// p4 bottom-left.
    pub fn base_position(&self, player: u8) -> (usize, usize) {
        match player {
            1 => (0, 0),
            2 => (self.rows - 1, self.cols - 1),
            3 => (0, self.cols - 1),
            _ => (self.rows - 1, 0),
        }
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.cells[self.index(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, cell: Cell) {
        let idx = self.index(row, col);
        self.cells[idx] = cell;
    }

    /// All in-bounds 8-neighbors of a cell.
    pub fn neighbors8(&self, row: usize, col: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        NEIGHBOR_OFFSETS_8.iter().filter_map(move |&(dr, dc)| {
            let r = row.checked_add_signed(dr)?;
            let c = col.checked_add_signed(dc)?;
            self.in_bounds(r, c).then_some((r, c))
        })
    }

    /// All in-bounds orthogonal neighbors of a cell.
    pub fn neighbors4(&self, row: usize, col: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        NEIGHBOR_OFFSETS_4.iter().filter_map(move |&(dr, dc)| {
            let r = row.checked_add_signed(dr)?;
            let c = col.checked_add_signed(dc)?;
            self.in_bounds(r, c).then_some((r, c))
        })
    }

    /// Iterates every cell with its coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Cell)> + '_ {
        self.cells.iter().enumerate().map(|(i, &cell)| {
            (i / self.cols, i % self.cols, cell)
        })
    }

    /// Number of territory cells (Normal + Fortified) a player holds.
    pub fn territory_count(&self, player: u8) -> usize {
        self.cells
            .iter()
            .filter(|c| c.is_territory_of(player))
            .count()
    }

    /// Number of cells carrying a player's owner id, base included.
    pub fn owned_count(&self, player: u8) -> usize {
        self.cells.iter().filter(|c| c.owner() == player).count()
    }

    pub fn fortified_count(&self, player: u8) -> usize {
        self.cells
            .iter()
            .filter(|c| c.owner() == player && c.flag() == Flag::Fortified)
            .count()
    }
}

const NEIGHBOR_OFFSETS_8: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

const NEIGHBOR_OFFSETS_4: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
