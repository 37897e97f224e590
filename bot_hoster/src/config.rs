use std::{env, time::Duration};

// Runtime constants and environment accessors for the hoster process.

pub fn backend_url() -> String {
    env::var("BACKEND_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080/ws".to_string())
}

pub fn pool_size() -> usize {
    env::var("BOT_POOL_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10)
}

pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
pub const STATS_INTERVAL: Duration = Duration::from_secs(30);
