use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080)
}

pub fn static_dir() -> String {
    env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string())
}

/// SQLite URL for the finished-games sink; persistence is disabled when unset.
pub fn database_url() -> Option<String> {
    env::var("DATABASE_URL").ok().filter(|v| !v.is_empty())
}

pub const HUB_CHANNEL_CAPACITY: usize = 1024;
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

pub const MAX_FRAME_BYTES: usize = 512;
pub const READ_DEADLINE: Duration = Duration::from_secs(60);
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);
pub const PING_INTERVAL: Duration = Duration::from_secs(54);

pub const MOVE_DEADLINE: Duration = Duration::from_secs(120);
pub const GAME_CLEANUP_DELAY: Duration = Duration::from_secs(10);
pub const CHALLENGE_TIMEOUT: Duration = Duration::from_secs(30);
pub const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
