// Transposition table, fresh per search. The RwLock is the only shared
// structure inside the AI process and never outlives one search.

use std::collections::HashMap;
use std::sync::RwLock;

use game_core::rules::Move;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exact,
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    pub score: i32,
    pub depth: u32,
    pub bound: Bound,
    /// Best move found at this node, tried first when the position recurs.
    pub best: Option<Move>,
}

pub struct TransTable {
    entries: RwLock<HashMap<u64, TtEntry>>,
}

impl TransTable {
    pub fn new() -> TransTable {
        TransTable {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: u64) -> Option<TtEntry> {
        self.entries.read().ok()?.get(&key).copied()
    }

    /// Deeper results replace shallower ones; equal depth overwrites so the
    /// latest bounds win.
    pub fn insert(&self, key: u64, entry: TtEntry) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };
        match entries.get(&key) {
            Some(existing) if existing.depth > entry.depth => {}
            _ => {
                entries.insert(key, entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deeper_entries_are_kept() {
        let table = TransTable::new();
        let mv = Some(Move::Standard { row: 0, col: 1 });
        table.insert(1, TtEntry { score: 5, depth: 3, bound: Bound::Exact, best: mv });
        table.insert(1, TtEntry { score: 9, depth: 1, bound: Bound::Lower, best: None });
        let kept = table.get(1).expect("entry");
        assert_eq!(kept.score, 5);
        assert_eq!(kept.best, mv);
        table.insert(1, TtEntry { score: 7, depth: 4, bound: Bound::Upper, best: None });
        assert_eq!(table.get(1).expect("entry").depth, 4);
        assert_eq!(table.len(), 1);
    }
}
