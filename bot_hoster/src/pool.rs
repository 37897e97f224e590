// The bot pool: N persistent connections plus an aggregate phase gauge for
// observability.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::info;

use crate::client::bot_task;
use crate::config::STATS_INTERVAL;

pub const PHASE_DISCONNECTED: u8 = 0;
pub const PHASE_IDLE: u8 = 1;
pub const PHASE_IN_LOBBY: u8 = 2;
pub const PHASE_IN_GAME: u8 = 3;

/// Each bot publishes its lifecycle phase into its own slot; the stats
/// logger aggregates without any coordination.
pub struct PoolStats {
    phases: Vec<AtomicU8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub total: usize,
    pub idle: usize,
    pub in_lobby: usize,
    pub in_game: usize,
    pub disconnected: usize,
}

impl PoolStats {
    pub fn new(pool_size: usize) -> PoolStats {
        PoolStats {
            phases: (0..pool_size).map(|_| AtomicU8::new(PHASE_DISCONNECTED)).collect(),
        }
    }

    pub fn set(&self, bot: usize, phase: u8) {
        self.phases[bot].store(phase, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Counters {
        let mut counters = Counters {
            total: self.phases.len(),
            idle: 0,
            in_lobby: 0,
            in_game: 0,
            disconnected: 0,
        };
        for phase in &self.phases {
            match phase.load(Ordering::Relaxed) {
                PHASE_IDLE => counters.idle += 1,
                PHASE_IN_LOBBY => counters.in_lobby += 1,
                PHASE_IN_GAME => counters.in_game += 1,
                _ => counters.disconnected += 1,
            }
        }
        counters
    }
}

/// Spawns the pool and runs until the process is killed.
pub async fn run(backend_url: String, pool_size: usize) {
    let stats = Arc::new(PoolStats::new(pool_size));

    let mut tasks = Vec::with_capacity(pool_size);
    for bot in 0..pool_size {
        tasks.push(tokio::spawn(bot_task(
            bot,
            backend_url.clone(),
            stats.clone(),
        )));
    }
    tokio::spawn(stats_logger(stats));

    for task in tasks {
        let _ = task.await;
    }
}

async fn stats_logger(stats: Arc<PoolStats>) {
    let mut interval = tokio::time::interval(STATS_INTERVAL);
    loop {
        interval.tick().await;
        let c = stats.snapshot();
        info!(
            total = c.total,
            idle = c.idle,
            in_lobby = c.in_lobby,
            in_game = c.in_game,
            disconnected = c.disconnected,
            "bot pool status"
        );
    }
}
