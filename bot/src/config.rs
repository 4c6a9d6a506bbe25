use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// Chat relay root, without a trailing slash.
    pub api_base_url: String,
    pub api_token: String,
    pub thread_id: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
}

fn positive_env<T>(name: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
}

fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name).with_context(|| format!("{name} is required"))?;
    let value = value.trim();
    anyhow::ensure!(!value.is_empty(), "{name} must not be empty");
    Ok(value.to_owned())
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_base_url: required_env("BOT_API_BASE_URL")?
                .trim_end_matches('/')
                .to_owned(),
            api_token: required_env("BOT_API_TOKEN")?,
            thread_id: required_env("GROUP_THREAD_ID")?,
            poll_interval: Duration::from_secs(
                positive_env("BOT_POLL_INTERVAL_SECS").unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            http_timeout: Duration::from_secs(
                positive_env("BOT_HTTP_TIMEOUT_SECS").unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
        })
    }
}
