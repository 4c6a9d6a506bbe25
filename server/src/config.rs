use std::str::FromStr;
use std::time::Duration;

use simpcity_shared::PAGE_SIZE;

pub const SERVER_PORT: u16 = 3000;
pub const STATIC_DIR: &str = "client/dist";

pub const SSE_KEEPALIVE_SECS: u64 = 15;
pub const DEFAULT_BROADCAST_BUFFER: usize = 256;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

pub const DEFAULT_CHANGE_FEED_POLL_SECS: u64 = 5;
pub const CHANGE_FEED_BATCH_SIZE: i64 = 500;
pub const TOTAL_COUNT_KEY: &str = "total_count";

pub const DEFAULT_PAGE_LIMIT: u32 = PAGE_SIZE;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Reads `name` and keeps it only if it parses and is strictly positive.
fn positive_env<T>(name: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
}

pub fn db_max_connections() -> u32 {
    positive_env("DB_MAX_CONNECTIONS").unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
}

pub fn sse_broadcast_buffer() -> usize {
    positive_env("SSE_BROADCAST_BUFFER").unwrap_or(DEFAULT_BROADCAST_BUFFER)
}

pub fn change_feed_poll_interval() -> Duration {
    Duration::from_secs(
        positive_env("CHANGE_FEED_POLL_SECS").unwrap_or(DEFAULT_CHANGE_FEED_POLL_SECS),
    )
}
