pub mod eval;
pub mod ordering;
pub mod search;
pub mod table;
pub mod zobrist;

pub use search::{Engine, Position};

pub(crate) fn manhattan(a: (usize, usize), b: (usize, usize)) -> usize {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}
